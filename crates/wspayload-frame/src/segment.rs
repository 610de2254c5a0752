//! Chained payload segments.
//!
//! A message payload is accumulated one frame at a time. Each frame's bytes
//! are kept as the buffer views they arrived in and linked onto a
//! [`SegmentChain`]; bytes are only copied when the chain is flattened at
//! message completion or when a shared view has to be unmasked in place.

use bytes::{Bytes, BytesMut};

/// A view over payload bytes.
///
/// `Shared` views are reference-counted and immutable: they may alias a
/// receive buffer that other readers still hold. `Owned` views are
/// exclusively owned and can be mutated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Shared(Bytes),
    Owned(BytesMut),
}

impl Segment {
    /// Create an owned segment holding a fresh copy of `data`.
    pub fn copy_from(data: &[u8]) -> Self {
        Self::Owned(BytesMut::from(data))
    }

    /// Number of bytes in this segment.
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Returns true if the segment holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the segment may alias memory owned elsewhere.
    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Shared(_))
    }

    /// Borrow the segment bytes.
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Self::Shared(bytes) => bytes.as_ref(),
            Self::Owned(buf) => buf.as_ref(),
        }
    }

    /// Mutable access to the segment bytes.
    ///
    /// A shared segment is converted to an owned one first. If this handle is
    /// the only reference to the underlying buffer it is reclaimed without
    /// copying; otherwise the bytes are copied into a new allocation.
    pub fn make_mut(&mut self) -> &mut [u8] {
        match self {
            Self::Owned(buf) => &mut buf[..],
            Self::Shared(shared) => {
                let owned = std::mem::take(shared)
                    .try_into_mut()
                    .unwrap_or_else(|shared| BytesMut::from(shared.as_ref()));
                *self = Self::Owned(owned);
                self.make_mut()
            }
        }
    }

    /// Split off the first `at` bytes into a new segment, without copying.
    ///
    /// Panics if `at > self.len()`.
    pub(crate) fn split_to(&mut self, at: usize) -> Segment {
        match self {
            Self::Shared(bytes) => Self::Shared(bytes.split_to(at)),
            Self::Owned(buf) => Self::Owned(buf.split_to(at)),
        }
    }

    /// Drop the first `count` bytes of this segment.
    pub(crate) fn advance(&mut self, count: usize) {
        use bytes::Buf;
        match self {
            Self::Shared(bytes) => bytes.advance(count),
            Self::Owned(buf) => buf.advance(count),
        }
    }

    /// Convert into an immutable `Bytes` handle without copying.
    pub fn freeze(self) -> Bytes {
        match self {
            Self::Shared(bytes) => bytes,
            Self::Owned(buf) => buf.freeze(),
        }
    }
}

impl From<Bytes> for Segment {
    fn from(bytes: Bytes) -> Self {
        Self::Shared(bytes)
    }
}

impl From<BytesMut> for Segment {
    fn from(buf: BytesMut) -> Self {
        Self::Owned(buf)
    }
}

/// Ordered, append-only list of payload segments.
///
/// Appending is O(1) amortized and never copies bytes. Walking the chain is
/// O(number of segments); only [`SegmentChain::to_owned_bytes`] touches every
/// byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentChain {
    segments: Vec<Segment>,
    len: usize,
}

impl SegmentChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a segment at the tail. Empty segments are ignored.
    pub fn append(&mut self, segment: Segment) {
        if segment.is_empty() {
            return;
        }
        self.len += segment.len();
        self.segments.push(segment);
    }

    /// Move every segment of `other` onto the tail of this chain.
    pub fn append_chain(&mut self, other: SegmentChain) {
        if self.segments.is_empty() {
            *self = other;
            return;
        }
        self.len += other.len;
        self.segments.extend(other.segments);
    }

    /// Total number of bytes across all segments.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the chain holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of linked segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Iterate over the segments in order.
    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Segment> {
        self.segments.iter_mut()
    }

    /// Remove all segments, releasing their buffers.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.len = 0;
    }

    /// Borrow the bytes if the chain is contiguous (zero or one segment).
    pub fn as_contiguous(&self) -> Option<&[u8]> {
        match self.segments.as_slice() {
            [] => Some(&[][..]),
            [only] => Some(only.as_slice()),
            _ => None,
        }
    }

    /// Flatten the chain into one freshly allocated buffer.
    ///
    /// The result never aliases any buffer referenced by the chain.
    pub fn to_owned_bytes(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(self.len);
        for segment in &self.segments {
            out.extend_from_slice(segment.as_slice());
        }
        out
    }

    /// Convert into a single `Bytes`, copying only if there is more than one
    /// segment.
    pub fn freeze(mut self) -> Bytes {
        match self.segments.len() {
            0 => Bytes::new(),
            1 => self.segments.remove(0).freeze(),
            _ => self.to_owned_bytes().freeze(),
        }
    }
}

impl From<BytesMut> for SegmentChain {
    fn from(buf: BytesMut) -> Self {
        let mut chain = Self::new();
        chain.append(Segment::Owned(buf));
        chain
    }
}

impl From<Bytes> for SegmentChain {
    fn from(bytes: Bytes) -> Self {
        let mut chain = Self::new();
        chain.append(Segment::Shared(bytes));
        chain
    }
}
