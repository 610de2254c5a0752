//! Per-Message Deflate extension (RFC 7692), decoding side.

use bytes::BytesMut;
use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::extension::{Extension, ExtensionError, MessageInfo};

/// Trailer stripped by the sender and restored before inflating.
const DEFLATE_TRAILER: [u8; 4] = [0x00, 0x00, 0xff, 0xff];

/// Default cap on the size of an inflated message: 64 MiB.
pub const DEFAULT_MAX_DECOMPRESSED: usize = 64 * 1024 * 1024;

/// Extension name used in `Sec-WebSocket-Extensions`.
pub const EXTENSION_NAME: &str = "permessage-deflate";

/// Decoder settings for permessage-deflate.
#[derive(Debug, Clone)]
pub struct DeflateConfig {
    /// Reset the inflate window after each message.
    pub no_context_takeover: bool,
    /// Largest inflated payload accepted.
    pub max_decompressed_size: usize,
}

impl Default for DeflateConfig {
    fn default() -> Self {
        Self {
            no_context_takeover: false,
            max_decompressed_size: DEFAULT_MAX_DECOMPRESSED,
        }
    }
}

/// Inflates compressed message payloads.
pub struct PerMessageDeflate {
    decompress: Decompress,
    config: DeflateConfig,
}

impl PerMessageDeflate {
    /// Create a decoder with default configuration.
    pub fn new() -> Self {
        Self::with_config(DeflateConfig::default())
    }

    /// Create a decoder with explicit configuration.
    pub fn with_config(config: DeflateConfig) -> Self {
        Self {
            decompress: Decompress::new(false),
            config,
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &DeflateConfig {
        &self.config
    }
}

impl Default for PerMessageDeflate {
    fn default() -> Self {
        Self::new()
    }
}

impl Extension for PerMessageDeflate {
    fn name(&self) -> &str {
        EXTENSION_NAME
    }

    /// Inflates data messages sent with RSV1. Control frames and
    /// uncompressed messages pass through untouched.
    fn decode(&mut self, info: &MessageInfo, data: &mut BytesMut) -> Result<(), ExtensionError> {
        if info.opcode.is_control() || !info.rsv[0] {
            return Ok(());
        }

        if self.config.no_context_takeover {
            self.decompress.reset(false);
        }

        let max = self.config.max_decompressed_size;
        let mut input = Vec::with_capacity(data.len() + DEFLATE_TRAILER.len());
        input.extend_from_slice(data);
        input.extend_from_slice(&DEFLATE_TRAILER);

        let initial = data.len().saturating_mul(4).clamp(1024, max.max(1024));
        let mut output: Vec<u8> = Vec::with_capacity(initial);
        let mut consumed = 0usize;

        loop {
            if output.len() == output.capacity() {
                output.reserve(output.capacity().max(4096));
            }

            let in_before = self.decompress.total_in();
            let out_before = self.decompress.total_out();
            let status =
                self.decompress
                    .decompress_vec(&input[consumed..], &mut output, FlushDecompress::Sync)?;
            consumed += (self.decompress.total_in() - in_before) as usize;

            if output.len() > max {
                return Err(ExtensionError::TooLarge { max });
            }

            let progressed = self.decompress.total_in() != in_before
                || self.decompress.total_out() != out_before;
            let drained = consumed >= input.len() && output.len() < output.capacity();
            if status == Status::StreamEnd || drained || !progressed {
                break;
            }
        }

        data.clear();
        data.extend_from_slice(&output);
        Ok(())
    }
}

/// Compress one message payload the way a permessage-deflate sender does:
/// raw deflate, sync-flushed, with the trailing `00 00 ff ff` removed.
pub fn deflate_message(data: &[u8], level: u32) -> Result<BytesMut, ExtensionError> {
    let mut compress = Compress::new(Compression::new(level), false);
    let mut output: Vec<u8> = Vec::with_capacity(data.len() / 2 + 64);

    loop {
        if output.len() == output.capacity() {
            output.reserve(output.capacity().max(64));
        }
        let consumed = compress.total_in() as usize;
        compress
            .compress_vec(&data[consumed..], &mut output, FlushCompress::Sync)
            .map_err(|err| ExtensionError::Failed(format!("deflate error: {err}")))?;

        if compress.total_in() as usize == data.len() && output.len() < output.capacity() {
            break;
        }
    }

    if output.ends_with(&DEFLATE_TRAILER) {
        output.truncate(output.len() - DEFLATE_TRAILER.len());
    }
    Ok(BytesMut::from(output.as_slice()))
}
