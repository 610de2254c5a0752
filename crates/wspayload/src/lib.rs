//! Incremental WebSocket payload decoding.
//!
//! wspayload turns a stream of RFC 6455 frame bytes, delivered in chunks of
//! any size, into complete messages: fragments are unmasked and chained
//! without copying, extensions such as permessage-deflate run once per
//! message, and text is validated as UTF-8.
//!
//! # Crate Structure
//!
//! - [`frame`]: Cursor, segment chain, payload assembler and decoder driver
//! - [`deflate`]: permessage-deflate extension (behind `deflate` feature)

/// Re-export frame decoding types.
pub mod frame {
    pub use wspayload_frame::*;
}

/// Re-export permessage-deflate types (requires `deflate` feature).
#[cfg(feature = "deflate")]
pub mod deflate {
    pub use wspayload_frame::deflate::*;
}
