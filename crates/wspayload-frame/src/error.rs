use crate::extension::ExtensionError;

/// Errors that can occur while decoding WebSocket payloads.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// An extension failed to transform a completed message.
    #[error("problem decoding with extension {name}: {source}")]
    Extension {
        name: String,
        #[source]
        source: ExtensionError,
    },

    /// A completed text message is not valid UTF-8.
    #[error("text message is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// A mask key was supplied with a length other than 4 bytes.
    #[error("invalid mask key length ({0} bytes, expected 4)")]
    InvalidMaskKey(usize),

    /// A single frame declares a payload larger than allowed.
    #[error("frame payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: u64, max: u64 },

    /// The reassembled message grew larger than allowed.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The decoder already failed and refuses further input.
    #[error("decoder stopped after an earlier error")]
    Terminated,

    /// The connection was closed before a complete message was received.
    #[error("connection closed (incomplete message)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, PayloadError>;
