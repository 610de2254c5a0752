use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

use crate::segment::{Segment, SegmentChain};

/// Resumable reader over received bytes that arrived in separate chunks.
///
/// Chunks are queued as they arrive. Consuming bytes splits the front chunks
/// without copying; bytes that are not consumed stay queued for the next call.
#[derive(Debug, Default)]
pub struct ByteCursor {
    chunks: VecDeque<Segment>,
    available: usize,
    consumed: u64,
}

impl ByteCursor {
    /// Create an empty cursor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an exclusively owned chunk.
    pub fn push(&mut self, chunk: BytesMut) {
        self.push_segment(Segment::Owned(chunk));
    }

    /// Queue a shared chunk. Masked payloads taken from it are copied before
    /// unmasking unless this cursor holds the only reference.
    pub fn push_shared(&mut self, chunk: Bytes) {
        self.push_segment(Segment::Shared(chunk));
    }

    fn push_segment(&mut self, chunk: Segment) {
        if chunk.is_empty() {
            return;
        }
        self.available += chunk.len();
        self.chunks.push_back(chunk);
    }

    /// Number of bytes currently buffered.
    pub fn available(&self) -> usize {
        self.available
    }

    /// Total bytes consumed since the cursor was created.
    pub fn position(&self) -> u64 {
        self.consumed
    }

    /// Number of queued chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Look at the next byte without consuming it.
    pub fn peek_u8(&self) -> Option<u8> {
        self.chunks
            .front()
            .and_then(|chunk| chunk.as_slice().first().copied())
    }

    /// Copy the next `dst.len()` bytes into `dst` without consuming them.
    ///
    /// Returns false, leaving `dst` untouched, if not enough bytes are buffered.
    pub fn copy_to(&self, dst: &mut [u8]) -> bool {
        if self.available < dst.len() {
            return false;
        }

        let mut filled = 0;
        for chunk in &self.chunks {
            if filled == dst.len() {
                break;
            }
            let src = chunk.as_slice();
            let n = src.len().min(dst.len() - filled);
            dst[filled..filled + n].copy_from_slice(&src[..n]);
            filled += n;
        }
        true
    }

    /// Remove exactly `count` bytes from the front as a chain of views.
    ///
    /// No bytes are copied: chunks are split at the boundary. Panics if
    /// `count` exceeds [`ByteCursor::available`].
    pub fn take(&mut self, count: usize) -> SegmentChain {
        assert!(
            count <= self.available,
            "take({count}) with only {} bytes buffered",
            self.available
        );

        let mut chain = SegmentChain::new();
        let mut remaining = count;
        while remaining > 0 {
            let Some(front) = self.chunks.front_mut() else {
                break;
            };
            if front.len() <= remaining {
                remaining -= front.len();
                if let Some(chunk) = self.chunks.pop_front() {
                    chain.append(chunk);
                }
            } else {
                chain.append(front.split_to(remaining));
                remaining = 0;
            }
        }

        self.available -= count;
        self.consumed += count as u64;
        chain
    }

    /// Discard `count` bytes from the front.
    ///
    /// Panics if `count` exceeds [`ByteCursor::available`].
    pub fn advance(&mut self, count: usize) {
        assert!(
            count <= self.available,
            "advance({count}) with only {} bytes buffered",
            self.available
        );

        let mut remaining = count;
        while remaining > 0 {
            let Some(front) = self.chunks.front_mut() else {
                break;
            };
            if front.len() <= remaining {
                remaining -= front.len();
                self.chunks.pop_front();
            } else {
                front.advance(remaining);
                remaining = 0;
            }
        }

        self.available -= count;
        self.consumed += count as u64;
    }

    /// Drop every buffered byte.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.available = 0;
    }
}
