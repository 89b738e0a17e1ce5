use alloc::vec::Vec;
use core::{borrow::Borrow, fmt, ops::Deref};

use crate::{raw::RawBuf, utils::debug_bytes};

/// Element storage detached from its array.
///
/// Returned by [`Array::steal`](crate::Array::steal) and
/// [`Array::free`](crate::Array::free); it can be handed back to
/// [`Array::new_take`](crate::Array::new_take) without copying.
///
/// The segment covers the array's elements only; the zero terminator of a
/// zero-terminated array stays in the allocation, past [`len`](Segment::len).
pub struct Segment {
    buf: RawBuf,
    len: usize,
}

impl Segment {
    pub(crate) fn new(buf: RawBuf, len: usize) -> Self {
        debug_assert!(len <= buf.size());
        Self { buf, len }
    }

    pub(crate) fn into_raw(self) -> (RawBuf, usize) {
        (self.buf, self.len)
    }

    /// An unallocated segment.
    pub const fn empty() -> Self {
        Self {
            buf: RawBuf::new(),
            len: 0,
        }
    }

    /// Returns `true` if the segment owns an allocation.
    ///
    /// A zero-terminated array stolen before its first growth yields no allocation.
    pub fn is_allocated(&self) -> bool {
        self.buf.is_allocated()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf.bytes()[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        let len = self.len;
        &mut self.buf.bytes_mut()[..len]
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl Default for Segment {
    fn default() -> Self {
        Self::empty()
    }
}

impl Deref for Segment {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl AsRef<[u8]> for Segment {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl Borrow<[u8]> for Segment {
    fn borrow(&self) -> &[u8] {
        self
    }
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Segment {}

impl PartialEq<[u8]> for Segment {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_slice() == other
    }
}

impl<const N: usize> PartialEq<[u8; N]> for Segment {
    fn eq(&self, other: &[u8; N]) -> bool {
        self.as_slice() == other
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_bytes(self, f)
    }
}

impl From<&[u8]> for Segment {
    fn from(value: &[u8]) -> Self {
        let mut buf = RawBuf::zeroed(value.len());
        buf.bytes_mut().copy_from_slice(value);
        Self::new(buf, value.len())
    }
}

/// Copies the bytes: array storage is always 16-byte aligned, which a `Vec`
/// allocation is not.
impl From<Vec<u8>> for Segment {
    fn from(value: Vec<u8>) -> Self {
        value.as_slice().into()
    }
}

impl From<Segment> for Vec<u8> {
    fn from(value: Segment) -> Self {
        value.to_vec()
    }
}
