//! Incremental frame decoding driver.
//!
//! [`PackageDecoder`] owns the byte cursor, the in-flight package and the
//! current part reader. Every call to [`PackageDecoder::next_package`] runs
//! readers until one of them needs more bytes or a message completes; all
//! state needed to resume lives in the decoder, so input can be fed in chunks
//! of any size.

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use crate::assembler::{PayloadAssembler, Progress};
use crate::config::DecoderConfig;
use crate::cursor::ByteCursor;
use crate::error::{PayloadError, Result};
use crate::extension::ExtensionChain;
use crate::opcode::OpCode;
use crate::package::WebSocketPackage;

/// Which part of a frame the decoder reads next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartReader {
    /// First two header bytes: FIN, RSV, opcode, mask bit, 7-bit length.
    Fixed,
    /// 16-bit extended payload length.
    ExtendedLength16,
    /// 64-bit extended payload length.
    ExtendedLength64,
    /// 4-byte mask key.
    MaskKey,
    /// Frame payload, handled by the [`PayloadAssembler`].
    Payload,
}

enum Step {
    Next(PartReader),
    NeedMoreData,
    Complete,
}

/// Resumable decoder from raw frame bytes to completed packages.
pub struct PackageDecoder {
    cursor: ByteCursor,
    package: WebSocketPackage,
    interrupted: Option<WebSocketPackage>,
    reader: PartReader,
    masked: bool,
    assembler: PayloadAssembler,
    extensions: ExtensionChain,
    config: DecoderConfig,
    failed: bool,
}

impl PackageDecoder {
    /// Create a decoder with default configuration and no extensions.
    pub fn new() -> Self {
        Self::with_config(DecoderConfig::default())
    }

    /// Create a decoder with explicit configuration.
    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            cursor: ByteCursor::new(),
            package: WebSocketPackage::new(OpCode::Continuation),
            interrupted: None,
            reader: PartReader::Fixed,
            masked: false,
            assembler: PayloadAssembler::with_max_message_size(config.max_message_size),
            extensions: ExtensionChain::new(),
            config,
            failed: false,
        }
    }

    /// Replace the extension chain.
    pub fn with_extensions(mut self, extensions: ExtensionChain) -> Self {
        self.extensions = extensions;
        self
    }

    /// Buffer an exclusively owned chunk of received bytes.
    ///
    /// Ignored once the decoder has terminated.
    pub fn feed(&mut self, chunk: BytesMut) {
        if !self.failed {
            self.cursor.push(chunk);
        }
    }

    /// Buffer a shared chunk of received bytes.
    pub fn feed_shared(&mut self, chunk: Bytes) {
        if !self.failed {
            self.cursor.push_shared(chunk);
        }
    }

    /// Decode the next complete message from buffered bytes.
    ///
    /// Returns `Ok(None)` when more bytes are needed. Calling again without
    /// feeding new bytes returns `Ok(None)` again and changes nothing.
    ///
    /// Any error is terminal: the stream position is no longer trustworthy,
    /// so the in-flight message and all buffered bytes are dropped and every
    /// later call returns [`PayloadError::Terminated`].
    pub fn next_package(&mut self) -> Result<Option<WebSocketPackage>> {
        if self.failed {
            return Err(PayloadError::Terminated);
        }

        loop {
            let step = match self.step() {
                Ok(step) => step,
                Err(err) => {
                    debug!(error = %err, position = self.cursor.position(), "decoder stopped");
                    self.terminate();
                    return Err(err);
                }
            };

            match step {
                Step::Next(reader) => self.reader = reader,
                Step::NeedMoreData => return Ok(None),
                Step::Complete => return Ok(Some(self.finish_message())),
            }
        }
    }

    /// Returns true if part of a frame or message has been consumed but the
    /// message is not complete yet.
    pub fn is_mid_message(&self) -> bool {
        self.reader != PartReader::Fixed
            || self.package.fragments > 0
            || self.interrupted.is_some()
    }

    /// Returns true once an error has stopped the decoder.
    pub fn is_terminated(&self) -> bool {
        self.failed
    }

    /// Bytes buffered but not consumed yet.
    pub fn buffered(&self) -> usize {
        self.cursor.available()
    }

    /// Total bytes consumed from the stream.
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// The part reader that handles the next bytes.
    pub fn reader(&self) -> PartReader {
        self.reader
    }

    /// Registered extensions.
    pub fn extensions(&self) -> &ExtensionChain {
        &self.extensions
    }

    /// Mutable access to the extension chain, for registering more.
    pub fn extensions_mut(&mut self) -> &mut ExtensionChain {
        &mut self.extensions
    }

    /// Update the maximum frame payload size for subsequent headers.
    pub fn set_max_payload_size(&mut self, max_payload_size: u64) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current decoder configuration.
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    fn step(&mut self) -> Result<Step> {
        match self.reader {
            PartReader::Fixed => self.read_fixed(),
            PartReader::ExtendedLength16 => self.read_extended_length(2),
            PartReader::ExtendedLength64 => self.read_extended_length(8),
            PartReader::MaskKey => self.read_mask_key(),
            PartReader::Payload => self.read_payload(),
        }
    }

    fn read_fixed(&mut self) -> Result<Step> {
        let mut head = [0u8; 2];
        if !self.cursor.copy_to(&mut head) {
            return Ok(Step::NeedMoreData);
        }
        self.cursor.advance(2);

        let opcode = OpCode::from_u8(head[0]);
        let fin = head[0] & 0x80 != 0;
        let rsv = [head[0] & 0x40 != 0, head[0] & 0x20 != 0, head[0] & 0x10 != 0];

        if self.package.fragments == 0 {
            self.package.opcode = opcode;
            self.package.rsv = rsv;
        } else if opcode.is_control() && self.interrupted.is_none() {
            // Control frames may arrive between fragments of a data message.
            let in_flight =
                std::mem::replace(&mut self.package, WebSocketPackage::new(opcode));
            self.package.rsv = rsv;
            self.interrupted = Some(in_flight);
        }

        self.package.fin = fin;
        self.package.mask_key = None;
        self.masked = head[1] & 0x80 != 0;

        trace!(%opcode, fin, masked = self.masked, len7 = head[1] & 0x7F, "frame header");

        match head[1] & 0x7F {
            126 => Ok(Step::Next(PartReader::ExtendedLength16)),
            127 => Ok(Step::Next(PartReader::ExtendedLength64)),
            len => self.set_payload_length(u64::from(len)),
        }
    }

    fn read_extended_length(&mut self, width: usize) -> Result<Step> {
        let mut buf = [0u8; 8];
        if !self.cursor.copy_to(&mut buf[..width]) {
            return Ok(Step::NeedMoreData);
        }
        self.cursor.advance(width);

        let len = if width == 2 {
            u64::from(u16::from_be_bytes([buf[0], buf[1]]))
        } else {
            u64::from_be_bytes(buf)
        };
        self.set_payload_length(len)
    }

    fn set_payload_length(&mut self, len: u64) -> Result<Step> {
        if len > self.config.max_payload_size {
            return Err(PayloadError::PayloadTooLarge {
                size: len,
                max: self.config.max_payload_size,
            });
        }
        self.package.payload_length = len;

        if self.masked {
            Ok(Step::Next(PartReader::MaskKey))
        } else {
            Ok(Step::Next(PartReader::Payload))
        }
    }

    fn read_mask_key(&mut self) -> Result<Step> {
        let mut key = [0u8; 4];
        if !self.cursor.copy_to(&mut key) {
            return Ok(Step::NeedMoreData);
        }
        self.cursor.advance(4);
        self.package.set_mask_key(&key)?;
        Ok(Step::Next(PartReader::Payload))
    }

    fn read_payload(&mut self) -> Result<Step> {
        let progress =
            self.assembler
                .process(&mut self.package, &mut self.extensions, &mut self.cursor)?;

        Ok(match progress {
            Progress::NeedMoreData => Step::NeedMoreData,
            Progress::FragmentComplete => Step::Next(PartReader::Fixed),
            Progress::MessageComplete => Step::Complete,
        })
    }

    fn finish_message(&mut self) -> WebSocketPackage {
        let next = self
            .interrupted
            .take()
            .unwrap_or_else(|| WebSocketPackage::new(OpCode::Continuation));
        self.reader = PartReader::Fixed;
        std::mem::replace(&mut self.package, next)
    }

    fn terminate(&mut self) {
        self.failed = true;
        self.package = WebSocketPackage::new(OpCode::Continuation);
        self.interrupted = None;
        self.reader = PartReader::Fixed;
        self.cursor.clear();
    }
}

impl Default for PackageDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PackageDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageDecoder")
            .field("reader", &self.reader)
            .field("failed", &self.failed)
            .field("buffered", &self.cursor.available())
            .field("position", &self.cursor.position())
            .field("extensions", &self.extensions)
            .finish()
    }
}

/// `tokio_util` codec adapter over [`PackageDecoder`].
#[cfg(feature = "async")]
pub struct WebSocketCodec {
    inner: PackageDecoder,
}

#[cfg(feature = "async")]
impl WebSocketCodec {
    /// Wrap a configured decoder.
    pub fn new(inner: PackageDecoder) -> Self {
        Self { inner }
    }

    /// Borrow the wrapped decoder.
    pub fn get_ref(&self) -> &PackageDecoder {
        &self.inner
    }

    /// Consume the codec and return the wrapped decoder.
    pub fn into_inner(self) -> PackageDecoder {
        self.inner
    }
}

#[cfg(feature = "async")]
impl tokio_util::codec::Decoder for WebSocketCodec {
    type Item = WebSocketPackage;
    type Error = PayloadError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if !src.is_empty() {
            self.inner.feed(src.split());
        }
        self.inner.next_package()
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(package) => Ok(Some(package)),
            None if self.inner.buffered() > 0 || self.inner.is_mid_message() => {
                Err(PayloadError::ConnectionClosed)
            }
            None => Ok(None),
        }
    }
}
