//! Incremental WebSocket (RFC 6455) payload decoding.
//!
//! Bytes arrive in chunks of any size and are fed to a [`PackageDecoder`],
//! which walks each frame through its header parts and hands the payload to
//! the [`PayloadAssembler`]. The assembler unmasks fragments, chains them
//! without copying, and on the final fragment runs the extension chain and
//! decodes text. No partial reads, no buffer management in user code.
//!
//! Blocking streams are wrapped by [`MessageReader`] and [`MessageWriter`];
//! with the `async` feature [`WebSocketCodec`] plugs the decoder into
//! `tokio_util::codec::FramedRead`.

pub mod assembler;
pub mod codec;
pub mod config;
pub mod cursor;
pub mod decoder;
#[cfg(feature = "deflate")]
pub mod deflate;
pub mod error;
pub mod extension;
pub mod mask;
pub mod opcode;
pub mod package;
pub mod reader;
pub mod segment;
pub mod writer;

pub use assembler::{PayloadAssembler, Progress};
pub use codec::{encode_frame, FrameHeader, MAX_HEADER_SIZE};
pub use config::{DecoderConfig, WriterConfig, DEFAULT_MAX_MESSAGE, DEFAULT_MAX_PAYLOAD};
pub use cursor::ByteCursor;
#[cfg(feature = "async")]
pub use decoder::WebSocketCodec;
pub use decoder::{PackageDecoder, PartReader};
#[cfg(feature = "deflate")]
pub use deflate::{deflate_message, DeflateConfig, PerMessageDeflate};
pub use error::{PayloadError, Result};
pub use extension::{Extension, ExtensionChain, ExtensionError, MessageInfo};
pub use mask::{apply_mask, apply_mask_offset, unmask_chain};
pub use opcode::OpCode;
pub use package::{Message, WebSocketPackage};
pub use reader::MessageReader;
pub use segment::{Segment, SegmentChain};
pub use writer::MessageWriter;
