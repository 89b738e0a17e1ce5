use alloc::alloc::{alloc_zeroed, dealloc, handle_alloc_error, realloc};
use core::{alloc::Layout, fmt, mem, ptr, ptr::NonNull, slice};

/// Alignment of every array allocation, large enough for any primitive element.
pub(crate) const ALIGN: usize = 16;

#[allow(dead_code)]
#[repr(C, align(16))]
struct MaxAlign([u8; ALIGN]);

/// Owned, reallocating byte storage.
///
/// Every byte of the allocation is initialized: fresh memory is zeroed, so
/// slots past an array's length hold either zeroes or stale element bytes.
pub(crate) struct RawBuf {
    ptr: NonNull<u8>,
    size: usize,
}

// SAFETY: `RawBuf` uniquely owns its allocation, like a `Box<[u8]>`
unsafe impl Send for RawBuf {}
// SAFETY: shared access only reads through `&self`
unsafe impl Sync for RawBuf {}

impl RawBuf {
    pub(crate) const fn new() -> Self {
        Self {
            ptr: NonNull::<MaxAlign>::dangling().cast(),
            size: 0,
        }
    }

    pub(crate) fn zeroed(size: usize) -> Self {
        let mut buf = Self::new();
        buf.resize(size);
        buf
    }

    fn layout(size: usize) -> Layout {
        match Layout::from_size_align(size, ALIGN) {
            Ok(layout) => layout,
            Err(_) => capacity_overflow(),
        }
    }

    pub(crate) fn is_allocated(&self) -> bool {
        self.size != 0
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        // SAFETY: the whole allocation is initialized
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.size) }
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: the whole allocation is initialized and uniquely owned
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.size) }
    }

    /// Grows or shrinks the allocation to exactly `new_size` bytes, zeroing any new tail.
    pub(crate) fn resize(&mut self, new_size: usize) {
        if new_size == self.size {
            return;
        }
        if new_size == 0 {
            drop(mem::replace(self, Self::new()));
            return;
        }
        let new_layout = Self::layout(new_size);
        let ptr = if self.size == 0 {
            // SAFETY: `new_size` is non-zero
            unsafe { alloc_zeroed(new_layout) }
        } else {
            let old_layout = Self::layout(self.size);
            // SAFETY: `ptr` was allocated with `old_layout`, `new_size` is non-zero
            let ptr = unsafe { realloc(self.ptr.as_ptr(), old_layout, new_size) };
            if !ptr.is_null() && new_size > self.size {
                // SAFETY: the tail belongs to the new allocation
                unsafe { ptr::write_bytes(ptr.add(self.size), 0, new_size - self.size) };
            }
            ptr
        };
        self.ptr = NonNull::new(ptr).unwrap_or_else(|| handle_alloc_error(new_layout));
        self.size = new_size;
    }

    /// Takes the allocation, leaving `self` unallocated.
    pub(crate) fn take(&mut self) -> Self {
        mem::replace(self, Self::new())
    }
}

impl Drop for RawBuf {
    fn drop(&mut self) {
        if self.size != 0 {
            // SAFETY: `ptr` was allocated with this layout
            unsafe { dealloc(self.ptr.as_ptr(), Self::layout(self.size)) };
        }
    }
}

impl fmt::Debug for RawBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawBuf")
            .field("ptr", &self.ptr)
            .field("size", &self.size)
            .finish()
    }
}

#[cold]
fn capacity_overflow() -> ! {
    panic!("capacity overflow")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unallocated_is_aligned() {
        let buf = RawBuf::new();
        assert!(!buf.is_allocated());
        assert_eq!(buf.as_ptr() as usize % ALIGN, 0);
        assert!(buf.bytes().is_empty());
    }

    #[test]
    fn growth_zeroes_tail() {
        let mut buf = RawBuf::zeroed(16);
        buf.bytes_mut().fill(0xaa);
        buf.resize(64);
        assert_eq!(buf.as_ptr() as usize % ALIGN, 0);
        assert!(buf.bytes()[..16].iter().all(|&b| b == 0xaa));
        assert!(buf.bytes()[16..].iter().all(|&b| b == 0));
    }

    #[test]
    fn take_leaves_unallocated() {
        let mut buf = RawBuf::zeroed(32);
        let taken = buf.take();
        assert_eq!(taken.size(), 32);
        assert!(!buf.is_allocated());
    }
}
