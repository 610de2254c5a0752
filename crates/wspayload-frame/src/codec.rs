use bytes::{BufMut, BytesMut};

use crate::mask::apply_mask;
use crate::opcode::OpCode;

/// Largest possible frame header: 2 + 8 (extended length) + 4 (mask key).
pub const MAX_HEADER_SIZE: usize = 14;

/// Payload lengths up to this value fit in the 7-bit length field.
pub const SMALL_PAYLOAD_MAX: u64 = 125;

/// Payload lengths up to this value use the 16-bit extended length.
pub const MEDIUM_PAYLOAD_MAX: u64 = 0xFFFF;

/// Header fields of an outgoing frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Final fragment flag.
    pub fin: bool,
    /// RSV1-3. RSV1 marks a compressed message under permessage-deflate.
    pub rsv: [bool; 3],
    /// Frame opcode.
    pub opcode: OpCode,
    /// Mask key; when set the payload is masked on encode.
    pub mask: Option<[u8; 4]>,
}

impl FrameHeader {
    /// Header for a frame with no reserved bits and no mask.
    pub fn new(opcode: OpCode, fin: bool) -> Self {
        Self {
            fin,
            rsv: [false; 3],
            opcode,
            mask: None,
        }
    }

    /// Set the mask key.
    pub fn with_mask(mut self, mask: Option<[u8; 4]>) -> Self {
        self.mask = mask;
        self
    }

    /// Set RSV1.
    pub fn with_rsv1(mut self, rsv1: bool) -> Self {
        self.rsv[0] = rsv1;
        self
    }

    /// Encoded size of this header for a payload of `payload_len` bytes.
    pub fn header_size(&self, payload_len: u64) -> usize {
        let mut size = 2;
        if payload_len > MEDIUM_PAYLOAD_MAX {
            size += 8;
        } else if payload_len > SMALL_PAYLOAD_MAX {
            size += 2;
        }
        if self.mask.is_some() {
            size += 4;
        }
        size
    }

    fn encode(&self, payload_len: u64, dst: &mut BytesMut) {
        let mut b0 = self.opcode.as_u8();
        if self.fin {
            b0 |= 0x80;
        }
        if self.rsv[0] {
            b0 |= 0x40;
        }
        if self.rsv[1] {
            b0 |= 0x20;
        }
        if self.rsv[2] {
            b0 |= 0x10;
        }
        dst.put_u8(b0);

        let mask_bit = if self.mask.is_some() { 0x80 } else { 0x00 };
        if payload_len <= SMALL_PAYLOAD_MAX {
            dst.put_u8(mask_bit | payload_len as u8);
        } else if payload_len <= MEDIUM_PAYLOAD_MAX {
            dst.put_u8(mask_bit | 126);
            dst.put_u16(payload_len as u16);
        } else {
            dst.put_u8(mask_bit | 127);
            dst.put_u64(payload_len);
        }

        if let Some(mask) = self.mask {
            dst.put_slice(&mask);
        }
    }
}

/// Encode one frame into the wire format.
///
/// Wire format (RFC 6455 §5.2):
/// ```text
/// ┌─┬─┬─┬─┬───────┬─┬─────────────┬──────────────────┬──────────┬─────────┐
/// │F│R│R│R│opcode │M│ length (7)  │ ext. length      │ mask key │ payload │
/// │I│1│2│3│  (4)  │ │ 126 → 16bit │ (0, 2 or 8 B BE) │ (0 or 4) │         │
/// │N│ │ │ │       │ │ 127 → 64bit │                  │          │         │
/// └─┴─┴─┴─┴───────┴─┴─────────────┴──────────────────┴──────────┴─────────┘
/// ```
/// If the header carries a mask key the payload is written masked.
pub fn encode_frame(header: &FrameHeader, payload: &[u8], dst: &mut BytesMut) {
    let payload_len = payload.len() as u64;
    dst.reserve(header.header_size(payload_len) + payload.len());
    header.encode(payload_len, dst);

    let start = dst.len();
    dst.put_slice(payload);
    if let Some(mask) = header.mask {
        apply_mask(&mut dst[start..], mask);
    }
}
