//! RFC 6455 payload masking.
//!
//! Masking XORs byte `i` of a frame payload with `key[i % 4]`. The operation is
//! its own inverse, so the same functions mask and unmask.

use crate::segment::SegmentChain;

/// XOR `data` in place with a repeating 4-byte key, starting at key index 0.
#[inline]
pub fn apply_mask(data: &mut [u8], key: [u8; 4]) {
    if data.is_empty() {
        return;
    }

    let wide = u64::from_ne_bytes([
        key[0], key[1], key[2], key[3], key[0], key[1], key[2], key[3],
    ]);

    let mut words = data.chunks_exact_mut(8);
    for word in &mut words {
        let mut lanes = [0u8; 8];
        lanes.copy_from_slice(word);
        word.copy_from_slice(&(u64::from_ne_bytes(lanes) ^ wide).to_ne_bytes());
    }

    for (i, byte) in words.into_remainder().iter_mut().enumerate() {
        *byte ^= key[i & 3];
    }
}

/// XOR `data` in place as if it started `offset` bytes into the masked
/// payload. Returns the offset of the byte following `data`.
#[inline]
pub fn apply_mask_offset(data: &mut [u8], key: [u8; 4], offset: usize) -> usize {
    let shift = offset & 3;
    let rotated = [
        key[shift],
        key[(shift + 1) & 3],
        key[(shift + 2) & 3],
        key[(shift + 3) & 3],
    ];
    apply_mask(data, rotated);
    offset.wrapping_add(data.len())
}

/// Unmask every segment of a frame payload in order.
///
/// The key index runs across segment boundaries and starts at 0, so the
/// result does not depend on how the payload was chunked. Shared segments are
/// converted to owned storage before being written.
pub fn unmask_chain(chain: &mut SegmentChain, key: [u8; 4]) {
    let mut offset = 0usize;
    for segment in chain.iter_mut() {
        offset = apply_mask_offset(segment.make_mut(), key, offset);
    }
}
