use alloc::boxed::Box;
use core::{cmp, cmp::Ordering, fmt, mem, ops::Range, slice};

use bytemuck::Pod;

use crate::{
    arc::Release,
    growth::{self, MAX_ELEMENTS},
    raw::{RawBuf, ALIGN},
    segment::Segment,
    sort::{binary_search_by, stable_sort_by},
    utils::panic_out_of_range,
};

/// Element destructor, called with the bytes of each discarded element.
pub type ClearFunc = Box<dyn Fn(&mut [u8]) + Send + Sync>;

/// How the gap left by a removed element is closed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Removal {
    /// Shift the following elements down, keeping their order; O(n).
    #[default]
    Preserve,
    /// Move the last element into the gap; O(1).
    Swap,
}

/// A growable array of fixed-size elements, stored as bytes with a stride.
///
/// The element size is chosen at construction. An array may be
/// zero-terminated, in which case one all-zero element is kept past the end
/// whenever storage is allocated, and may clear newly exposed elements to
/// zero. Without clearing, elements exposed by [`set_size`](Self::set_size)
/// hold zeroes or the bytes of previously removed elements.
///
/// Typed access goes through [`bytemuck::Pod`]:
///
/// ```rust
/// use arc_array::Array;
///
/// let mut array = Array::for_type::<u32>(true, false);
/// array.append(&[3u32, 1, 2]);
/// array.sort_by::<u32>(|a, b| a.cmp(b));
/// assert_eq!(array.as_slice::<u32>(), [1, 2, 3]);
/// assert_eq!(array.terminator(), Some(&[0u8; 4][..]));
/// ```
pub struct Array {
    buf: RawBuf,
    len: usize,
    capacity: usize,
    elt_size: usize,
    zero_terminated: bool,
    clear: bool,
    clear_func: Option<ClearFunc>,
}

impl Array {
    pub fn new(zero_terminated: bool, clear: bool, elt_size: usize) -> Self {
        Self::sized_new(zero_terminated, clear, elt_size, 0)
    }

    /// Creates an array with room for `reserved` elements.
    ///
    /// Zero-terminated arrays are always allocated, so the terminator is
    /// present from the start.
    ///
    /// # Panics
    ///
    /// Panics if `elt_size` is zero or larger than half the address space.
    pub fn sized_new(zero_terminated: bool, clear: bool, elt_size: usize, reserved: usize) -> Self {
        assert!(
            elt_size > 0 && elt_size < usize::MAX / 2,
            "invalid element size {elt_size}"
        );
        let mut array = Self {
            buf: RawBuf::new(),
            len: 0,
            capacity: 0,
            elt_size,
            zero_terminated,
            clear,
            clear_func: None,
        };
        if zero_terminated || reserved != 0 {
            array.reserve(reserved);
            array.zero_terminate();
        }
        array
    }

    /// Creates an array whose element size is the size of `T`.
    pub fn for_type<T: Pod>(zero_terminated: bool, clear: bool) -> Self {
        assert!(mem::align_of::<T>() <= ALIGN, "unsupported element alignment");
        Self::new(zero_terminated, clear, mem::size_of::<T>())
    }

    /// Creates an array owning `data`, whose length must be a multiple of `elt_size`.
    ///
    /// A [`Segment`] is adopted without copying; a `Vec<u8>` or slice is
    /// copied into a new aligned allocation.
    pub fn new_take(data: impl Into<Segment>, clear: bool, elt_size: usize) -> Self {
        let mut array = Self::new(false, clear, elt_size);
        let (buf, bytes) = data.into().into_raw();
        assert_eq!(bytes % elt_size, 0, "data length is not a multiple of element size");
        let len = bytes / elt_size;
        assert!(len <= MAX_ELEMENTS, "too many elements");
        array.capacity = cmp::min(buf.size() / elt_size, MAX_ELEMENTS);
        array.buf = buf;
        array.len = len;
        array
    }

    /// Creates a zero-terminated array owning `data`.
    ///
    /// The length is the index of the first all-zero element of `data`. If
    /// `data` holds none, the element right after it must be an all-zero
    /// terminator inside the allocation, as left by
    /// [`steal`](Self::steal) on a zero-terminated array. Empty unallocated
    /// data gives an unallocated array.
    ///
    /// # Panics
    ///
    /// Panics if the data length is not a multiple of `elt_size`, or if no
    /// terminator is found.
    pub fn new_take_zero_terminated(data: impl Into<Segment>, clear: bool, elt_size: usize) -> Self {
        let mut array = Self::new(false, clear, elt_size);
        let (buf, bytes) = data.into().into_raw();
        array.zero_terminated = true;
        if !buf.is_allocated() {
            return array;
        }
        assert_eq!(bytes % elt_size, 0, "data length is not a multiple of element size");
        let is_zero = |element: &[u8]| element.iter().all(|&b| b == 0);
        let count = bytes / elt_size;
        let len = match buf.bytes()[..bytes].chunks_exact(elt_size).position(is_zero) {
            Some(len) => len,
            None => match buf.bytes().get(bytes..bytes + elt_size) {
                Some(terminator) if is_zero(terminator) => count,
                _ => panic!("missing zero terminator"),
            },
        };
        assert!(len < MAX_ELEMENTS, "too many elements");
        array.capacity = cmp::min(buf.size() / elt_size, MAX_ELEMENTS);
        array.buf = buf;
        array.len = len;
        array
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of allocated element slots, terminator slot included.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn element_size(&self) -> usize {
        self.elt_size
    }

    pub fn is_zero_terminated(&self) -> bool {
        self.zero_terminated
    }

    /// Returns `true` if newly exposed elements are cleared to zero.
    pub fn is_clear(&self) -> bool {
        self.clear
    }

    /// Sets the function called on each element when it is removed or when
    /// the array is destroyed.
    ///
    /// [`steal`](Self::steal) and [`free(false)`](Self::free) do not call it:
    /// the caller owns the elements afterwards.
    pub fn set_clear_func(&mut self, clear_func: Option<ClearFunc>) {
        self.clear_func = clear_func;
    }

    pub fn has_clear_func(&self) -> bool {
        self.clear_func.is_some()
    }

    fn range(&self, index: usize, count: usize) -> Range<usize> {
        index * self.elt_size..(index + count) * self.elt_size
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf.bytes()[..self.len * self.elt_size]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        let end = self.len * self.elt_size;
        &mut self.buf.bytes_mut()[..end]
    }

    /// Returns the pointer to the first element.
    ///
    /// When the array is zero-terminated and allocated, the elements are
    /// followed by the all-zero terminator.
    pub fn as_ptr(&self) -> *const u8 {
        self.buf.as_ptr()
    }

    /// Returns the terminator slot of an allocated zero-terminated array.
    pub fn terminator(&self) -> Option<&[u8]> {
        (self.zero_terminated && self.buf.is_allocated())
            .then(|| &self.buf.bytes()[self.range(self.len, 1)])
    }

    #[track_caller]
    pub fn element(&self, index: usize) -> &[u8] {
        if index >= self.len {
            panic_out_of_range(index, self.len);
        }
        &self.buf.bytes()[self.range(index, 1)]
    }

    #[track_caller]
    pub fn element_mut(&mut self, index: usize) -> &mut [u8] {
        if index >= self.len {
            panic_out_of_range(index, self.len);
        }
        let range = self.range(index, 1);
        &mut self.buf.bytes_mut()[range]
    }

    #[track_caller]
    fn check_type<T: Pod>(&self) {
        assert_eq!(
            mem::size_of::<T>(),
            self.elt_size,
            "element size mismatch"
        );
        assert!(mem::align_of::<T>() <= ALIGN, "unsupported element alignment");
    }

    /// Views the elements as `T`.
    ///
    /// # Panics
    ///
    /// Panics if the size of `T` is not the element size.
    #[track_caller]
    pub fn as_slice<T: Pod>(&self) -> &[T] {
        self.check_type::<T>();
        bytemuck::cast_slice(self.as_bytes())
    }

    #[track_caller]
    pub fn as_mut_slice<T: Pod>(&mut self) -> &mut [T] {
        self.check_type::<T>();
        bytemuck::cast_slice_mut(self.as_bytes_mut())
    }

    /// Reserves room for `additional` more elements.
    ///
    /// Aborts the process if the resulting length would exceed the size limits.
    pub fn reserve(&mut self, additional: usize) {
        if let Some(growth) = growth::grow(
            self.len,
            self.capacity,
            additional,
            self.elt_size,
            self.zero_terminated,
        ) {
            self.buf.resize(growth.bytes);
            self.capacity = growth.capacity;
        }
    }

    #[cfg(feature = "bytes")]
    fn spare_len(&self) -> usize {
        (self.capacity - self.len).saturating_sub(usize::from(self.zero_terminated))
    }

    /// Allocated bytes past the last element, the terminator excluded.
    #[cfg(feature = "bytes")]
    pub(crate) fn spare_bytes_mut(&mut self) -> &mut [u8] {
        let spare = self.spare_len();
        let range = self.range(self.len, spare);
        &mut self.buf.bytes_mut()[range]
    }

    /// Extends the length over `count` spare elements, which are already initialized.
    #[cfg(feature = "bytes")]
    #[track_caller]
    pub(crate) fn commit_spare(&mut self, count: usize) {
        let spare = self.spare_len();
        assert!(count <= spare, "{count} elements exceed spare capacity {spare}");
        self.len += count;
        self.zero_terminate();
    }

    fn zero_terminate(&mut self) {
        if self.zero_terminated && self.buf.is_allocated() {
            self.zero_elements(self.len, 1);
        }
    }

    fn zero_elements(&mut self, index: usize, count: usize) {
        let range = self.range(index, count);
        self.buf.bytes_mut()[range].fill(0);
    }

    fn clear_elements(&mut self, index: usize, count: usize) {
        if let Some(clear_func) = &self.clear_func {
            let range = index * self.elt_size..(index + count) * self.elt_size;
            for element in self.buf.bytes_mut()[range].chunks_exact_mut(self.elt_size) {
                clear_func(element);
            }
        }
    }

    #[track_caller]
    fn count_of(&self, data: &[u8]) -> usize {
        assert_eq!(
            data.len() % self.elt_size,
            0,
            "data length is not a multiple of element size"
        );
        data.len() / self.elt_size
    }

    /// Appends the elements contained in `data`.
    pub fn append_vals(&mut self, data: &[u8]) {
        let count = self.count_of(data);
        if count == 0 {
            return;
        }
        self.reserve(count);
        let range = self.range(self.len, count);
        self.buf.bytes_mut()[range].copy_from_slice(data);
        self.len += count;
        self.zero_terminate();
    }

    /// Inserts the elements contained in `data` at the start of the array.
    pub fn prepend_vals(&mut self, data: &[u8]) {
        let count = self.count_of(data);
        if count == 0 {
            return;
        }
        self.reserve(count);
        let tail = self.range(0, self.len);
        let head = self.range(0, count);
        let bytes = self.buf.bytes_mut();
        bytes.copy_within(tail, head.end);
        bytes[head].copy_from_slice(data);
        self.len += count;
        self.zero_terminate();
    }

    /// Inserts the elements contained in `data` at `index`.
    ///
    /// An index past the end first extends the array to `index`, clearing
    /// the gap if the array clears new elements.
    pub fn insert_vals(&mut self, index: usize, data: &[u8]) {
        let count = self.count_of(data);
        if count == 0 {
            return;
        }
        if index >= self.len {
            self.reserve((index - self.len).saturating_add(count));
            self.set_size(index);
            self.append_vals(data);
            return;
        }
        self.reserve(count);
        let tail = self.range(index, self.len - index);
        let slot = self.range(index, count);
        let bytes = self.buf.bytes_mut();
        bytes.copy_within(tail, slot.end);
        bytes[slot].copy_from_slice(data);
        self.len += count;
        self.zero_terminate();
    }

    #[track_caller]
    pub fn append<T: Pod>(&mut self, values: &[T]) {
        self.check_type::<T>();
        self.append_vals(bytemuck::cast_slice(values));
    }

    #[track_caller]
    pub fn append_val<T: Pod>(&mut self, value: T) {
        self.append(slice::from_ref(&value));
    }

    #[track_caller]
    pub fn prepend<T: Pod>(&mut self, values: &[T]) {
        self.check_type::<T>();
        self.prepend_vals(bytemuck::cast_slice(values));
    }

    #[track_caller]
    pub fn prepend_val<T: Pod>(&mut self, value: T) {
        self.prepend(slice::from_ref(&value));
    }

    #[track_caller]
    pub fn insert<T: Pod>(&mut self, index: usize, values: &[T]) {
        self.check_type::<T>();
        self.insert_vals(index, bytemuck::cast_slice(values));
    }

    #[track_caller]
    pub fn insert_val<T: Pod>(&mut self, index: usize, value: T) {
        self.insert(index, slice::from_ref(&value));
    }

    /// Sets the length of the array.
    ///
    /// Growing clears the new elements if the array clears new elements.
    /// Shrinking removes the trailing elements, calling the clear function
    /// on each of them in index order.
    pub fn set_size(&mut self, len: usize) {
        match len.cmp(&self.len) {
            Ordering::Greater => {
                self.reserve(len - self.len);
                if self.clear {
                    self.zero_elements(self.len, len - self.len);
                }
            }
            Ordering::Less => self.remove_range(len, self.len - len),
            Ordering::Equal => {}
        }
        self.len = len;
        self.zero_terminate();
    }

    /// Removes the element at `index`, calling the clear function on it.
    #[track_caller]
    pub fn remove_index(&mut self, index: usize, removal: Removal) {
        if index >= self.len {
            panic_out_of_range(index, self.len);
        }
        self.clear_elements(index, 1);
        let last = self.len - 1;
        if index != last {
            let src = match removal {
                Removal::Preserve => self.range(index + 1, last - index),
                Removal::Swap => self.range(last, 1),
            };
            let dst = index * self.elt_size;
            self.buf.bytes_mut().copy_within(src, dst);
        }
        self.len = last;
        self.vacate(1);
    }

    /// Removes `count` elements starting at `index`, calling the clear
    /// function on each of them.
    #[track_caller]
    pub fn remove_range(&mut self, index: usize, count: usize) {
        if index > self.len || count > self.len - index {
            panic!(
                "range {index}..{} out of range for array of length {}",
                index.saturating_add(count),
                self.len
            );
        }
        if count == 0 {
            return;
        }
        self.clear_elements(index, count);
        let end = index + count;
        if end != self.len {
            let src = self.range(end, self.len - end);
            let dst = index * self.elt_size;
            self.buf.bytes_mut().copy_within(src, dst);
        }
        self.len -= count;
        self.vacate(count);
    }

    // After a removal, `count` slots past the end no longer hold elements.
    fn vacate(&mut self, count: usize) {
        if cfg!(feature = "gc-friendly") {
            self.zero_elements(self.len, count);
        } else {
            self.zero_terminate();
        }
    }

    /// Sorts the elements with a stable sort.
    ///
    /// The comparator receives the bytes of each element.
    pub fn sort(&mut self, compare: impl FnMut(&[u8], &[u8]) -> Ordering) {
        let elt_size = self.elt_size;
        stable_sort_by(self.as_bytes_mut(), elt_size, compare);
    }

    /// Like [`sort`](Self::sort), passing `data` to every comparison.
    pub fn sort_with_data<D: ?Sized>(
        &mut self,
        data: &D,
        mut compare: impl FnMut(&[u8], &[u8], &D) -> Ordering,
    ) {
        self.sort(|a, b| compare(a, b, data));
    }

    /// Sorts the elements viewed as `T`, with a stable sort.
    #[track_caller]
    pub fn sort_by<T: Pod>(&mut self, compare: impl FnMut(&T, &T) -> Ordering) {
        self.as_mut_slice::<T>().sort_by(compare);
    }

    /// Searches a sorted array for `target`.
    ///
    /// Returns the lowest index of an element equal to `target`. The result is
    /// unspecified if the array is not sorted according to `compare`.
    pub fn binary_search(
        &self,
        target: &[u8],
        mut compare: impl FnMut(&[u8], &[u8]) -> Ordering,
    ) -> Option<usize> {
        binary_search_by(self.len, |i| {
            compare(&self.buf.bytes()[self.range(i, 1)], target)
        })
    }

    /// Typed version of [`binary_search`](Self::binary_search).
    #[track_caller]
    pub fn binary_search_by<T: Pod>(
        &self,
        target: &T,
        mut compare: impl FnMut(&T, &T) -> Ordering,
    ) -> Option<usize> {
        let values = self.as_slice::<T>();
        binary_search_by(values.len(), |i| compare(&values[i], target))
    }

    /// Takes the element storage, leaving the array empty and unallocated.
    ///
    /// The clear function is not called; the caller owns the elements.
    pub fn steal(&mut self) -> Segment {
        let bytes = self.len * self.elt_size;
        self.len = 0;
        self.capacity = 0;
        Segment::new(self.buf.take(), bytes)
    }

    /// Destroys the array.
    ///
    /// With `free_segment`, the elements are cleared and the storage
    /// released; otherwise the storage is returned to the caller.
    pub fn free(mut self, free_segment: bool) -> Option<Segment> {
        self.release(free_segment)
    }
}

impl Release for Array {
    type Segment = Segment;

    fn release(&mut self, free_segment: bool) -> Option<Segment> {
        if free_segment {
            self.clear_elements(0, self.len);
            self.len = 0;
            self.capacity = 0;
            drop(self.buf.take());
            return None;
        }
        Some(self.steal())
    }
}

impl Drop for Array {
    fn drop(&mut self) {
        self.clear_elements(0, self.len);
    }
}

/// Copies the elements; the clear function is not copied.
impl Clone for Array {
    fn clone(&self) -> Self {
        let mut array = Self::sized_new(self.zero_terminated, self.clear, self.elt_size, self.len);
        array.append_vals(self.as_bytes());
        array
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        self.elt_size == other.elt_size && self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Array {}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("element_size", &self.elt_size)
            .field("zero_terminated", &self.zero_terminated)
            .field("clear", &self.clear)
            .field("clear_func", &self.clear_func.is_some())
            .finish()
    }
}
