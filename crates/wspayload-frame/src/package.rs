use bytes::Bytes;

use crate::error::{PayloadError, Result};
use crate::opcode::OpCode;
use crate::segment::SegmentChain;

/// One in-flight, then completed, WebSocket message.
///
/// Header readers fill in the per-frame fields before every payload step; the
/// payload assembler accumulates bytes into `data` and finalizes the message on
/// the last fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSocketPackage {
    /// Opcode of the first frame of the message.
    pub opcode: OpCode,
    /// FIN flag of the current frame.
    pub fin: bool,
    /// RSV1-3 of the first frame, carried but never validated.
    pub rsv: [bool; 3],
    /// Payload length of the current frame.
    pub payload_length: u64,
    /// Mask key of the current frame, if masked.
    pub mask_key: Option<[u8; 4]>,
    /// Frames consumed so far for this message.
    pub fragments: usize,
    pub(crate) data: SegmentChain,
    pub(crate) message: Option<String>,
}

/// A completed message handed to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Bytes),
    Close(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Other(OpCode, Bytes),
}

impl WebSocketPackage {
    /// Create an empty package for a message starting with `opcode`.
    pub fn new(opcode: OpCode) -> Self {
        Self {
            opcode,
            fin: false,
            rsv: [false; 3],
            payload_length: 0,
            mask_key: None,
            fragments: 0,
            data: SegmentChain::new(),
            message: None,
        }
    }

    /// Set the current frame header fields in one call.
    pub fn set_frame(&mut self, fin: bool, payload_length: u64, mask_key: Option<[u8; 4]>) {
        self.fin = fin;
        self.payload_length = payload_length;
        self.mask_key = mask_key;
    }

    /// Set the mask key from raw header bytes.
    ///
    /// Keys must be exactly 4 bytes.
    pub fn set_mask_key(&mut self, key: &[u8]) -> Result<()> {
        let key: [u8; 4] = key
            .try_into()
            .map_err(|_| PayloadError::InvalidMaskKey(key.len()))?;
        self.mask_key = Some(key);
        Ok(())
    }

    /// Returns true if the current frame is masked.
    pub fn has_mask(&self) -> bool {
        self.mask_key.is_some()
    }

    /// Accumulated payload bytes.
    ///
    /// While the message is in flight this holds the unmasked bytes of every
    /// fragment consumed so far. After completion it is empty for text
    /// messages and a single frozen buffer otherwise.
    pub fn data(&self) -> &SegmentChain {
        &self.data
    }

    /// Decoded text of a completed text message.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Payload of a completed non-text message.
    ///
    /// Returns a new handle to the completed buffer without copying it.
    pub fn payload(&self) -> Bytes {
        self.data.clone().freeze()
    }

    /// Convert a completed package into a [`Message`].
    pub fn into_message(self) -> Message {
        let payload = self.data.freeze();
        match self.opcode {
            OpCode::Text => Message::Text(self.message.unwrap_or_default()),
            OpCode::Binary => Message::Binary(payload),
            OpCode::Close => Message::Close(payload),
            OpCode::Ping => Message::Ping(payload),
            OpCode::Pong => Message::Pong(payload),
            other => Message::Other(other, payload),
        }
    }
}

impl Message {
    /// Opcode this message was received with.
    pub fn opcode(&self) -> OpCode {
        match self {
            Self::Text(_) => OpCode::Text,
            Self::Binary(_) => OpCode::Binary,
            Self::Close(_) => OpCode::Close,
            Self::Ping(_) => OpCode::Ping,
            Self::Pong(_) => OpCode::Pong,
            Self::Other(op, _) => *op,
        }
    }

    /// Message body as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(b) | Self::Close(b) | Self::Ping(b) | Self::Pong(b) | Self::Other(_, b) => {
                b.as_ref()
            }
        }
    }

    /// Close status code and reason, for close messages with a body.
    pub fn close_code_and_reason(&self) -> Option<(u16, String)> {
        let Self::Close(payload) = self else {
            return None;
        };
        if payload.len() < 2 {
            return None;
        }
        let code = u16::from_be_bytes([payload[0], payload[1]]);
        let reason = String::from_utf8_lossy(&payload[2..]).into_owned();
        Some((code, reason))
    }
}
