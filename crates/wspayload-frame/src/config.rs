/// Default maximum payload size of a single frame: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: u64 = 16 * 1024 * 1024;

/// Default maximum size of a reassembled message: 64 MiB.
pub const DEFAULT_MAX_MESSAGE: usize = 64 * 1024 * 1024;

/// Limits applied while decoding incoming frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Largest payload length accepted in a single frame header.
    pub max_payload_size: u64,
    /// Largest reassembled message, measured before extensions run.
    /// `None` disables the check.
    pub max_message_size: Option<usize>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            max_message_size: Some(DEFAULT_MAX_MESSAGE),
        }
    }
}

impl DecoderConfig {
    /// Configuration without size limits. Intended for trusted input only.
    pub fn unbounded() -> Self {
        Self {
            max_payload_size: u64::MAX,
            max_message_size: None,
        }
    }
}

/// Settings for outgoing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriterConfig {
    /// Split data messages into frames of at most this many payload bytes.
    /// `None` sends every message as a single frame.
    pub fragment_size: Option<usize>,
    /// Mask key applied to every outgoing frame (client role).
    pub mask: Option<[u8; 4]>,
}
