use bytes::{buf::UninitSlice, BufMut, Bytes};

use crate::{byte_array::ByteArray, growth::MAX_ELEMENTS, segment::Segment};

const MIN_CHUNK: usize = 64;

impl ByteArray {
    /// Converts the array into [`Bytes`] without copying.
    pub fn free_to_bytes(mut self) -> Bytes {
        self.steal().into()
    }
}

impl From<Segment> for Bytes {
    fn from(value: Segment) -> Self {
        if value.is_allocated() {
            Bytes::from_owner(value)
        } else {
            Bytes::new()
        }
    }
}

// SAFETY: the spare bytes are always initialized, so committing any of them
// never exposes uninitialized memory
unsafe impl BufMut for ByteArray {
    fn remaining_mut(&self) -> usize {
        MAX_ELEMENTS - self.len()
    }

    unsafe fn advance_mut(&mut self, cnt: usize) {
        self.as_array_mut().commit_spare(cnt);
    }

    fn chunk_mut(&mut self) -> &mut UninitSlice {
        if self.as_array_mut().spare_bytes_mut().is_empty() {
            self.reserve(MIN_CHUNK);
        }
        UninitSlice::new(self.as_array_mut().spare_bytes_mut())
    }

    fn put_slice(&mut self, src: &[u8]) {
        self.append(src);
    }
}
