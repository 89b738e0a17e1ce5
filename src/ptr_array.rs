use alloc::{sync::Arc, vec, vec::Vec};
use core::{cmp, cmp::Ordering, fmt, mem, ops::Index, slice};

use crate::{
    arc::Release,
    array::Removal,
    growth::{self, MAX_ELEMENTS},
    utils::panic_out_of_range,
};

/// Element destructor, called with each discarded element.
///
/// Shared between an array and its copies.
pub type FreeFunc<T> = Arc<dyn Fn(T) + Send + Sync>;

/// A growable array of nullable owned references.
///
/// `None` plays the role of the null reference. A null-terminated array keeps
/// one `None` past the end whenever storage is allocated; this is a property
/// of the array, distinct from a trailing `None` element.
///
/// Elements discarded by the array (removal, [`set_size`](Self::set_size),
/// destruction) are passed to the free function when one is set, and dropped
/// otherwise. The `steal` variants hand elements back to the caller instead.
///
/// ```rust
/// use arc_array::{PtrArray, Removal};
///
/// let mut array = PtrArray::new_null_terminated(0, None, true);
/// array.add(Some("a"));
/// array.add(None);
/// array.add(Some("b"));
/// assert_eq!(array.len(), 3);
/// assert_eq!(array.steal_index(0, Removal::Swap), Some("a"));
/// assert_eq!(array.as_terminated_slice(), Some(&[Some("b"), None, None][..]));
/// ```
pub struct PtrArray<T> {
    // holds the trailing `None` when null-terminated and allocated
    pdata: Vec<Option<T>>,
    null_terminated: bool,
    free_func: Option<FreeFunc<T>>,
}

fn slot_size<T>() -> usize {
    cmp::max(mem::size_of::<Option<T>>(), 1)
}

impl<T> PtrArray<T> {
    pub fn new() -> Self {
        Self::new_null_terminated(0, None, false)
    }

    pub fn sized_new(reserved: usize) -> Self {
        Self::new_null_terminated(reserved, None, false)
    }

    pub fn with_free_func(free_func: impl Fn(T) + Send + Sync + 'static) -> Self {
        Self::new_null_terminated(0, Some(Arc::new(free_func)), false)
    }

    pub fn new_full(reserved: usize, free_func: Option<FreeFunc<T>>) -> Self {
        Self::new_null_terminated(reserved, free_func, false)
    }

    /// Creates an array with room for `reserved` elements.
    ///
    /// Storage is only allocated when `reserved` is non-zero, so an empty
    /// null-terminated array may not hold its terminator yet.
    pub fn new_null_terminated(
        reserved: usize,
        free_func: Option<FreeFunc<T>>,
        null_terminated: bool,
    ) -> Self {
        let mut array = Self {
            pdata: Vec::new(),
            null_terminated,
            free_func,
        };
        if reserved != 0 {
            array.reserve(reserved);
        }
        array
    }

    /// Creates an array owning the elements of `data`.
    pub fn new_take(data: Vec<Option<T>>, free_func: Option<FreeFunc<T>>) -> Self {
        assert!(data.len() <= MAX_ELEMENTS, "too many elements");
        Self {
            pdata: data,
            null_terminated: false,
            free_func,
        }
    }

    /// Creates a null-terminated array owning the elements of `data` up to
    /// the first `None`.
    ///
    /// Elements past the first `None` are dropped. Empty data gives an
    /// unallocated array.
    ///
    /// # Panics
    ///
    /// Panics if non-empty data contains no `None`.
    pub fn new_take_null_terminated(
        mut data: Vec<Option<T>>,
        free_func: Option<FreeFunc<T>>,
    ) -> Self {
        if data.is_empty() {
            return Self::new_null_terminated(0, free_func, true);
        }
        let len = data
            .iter()
            .position(Option::is_none)
            .unwrap_or_else(|| panic!("missing null terminator"));
        assert!(len < MAX_ELEMENTS, "too many elements");
        data.truncate(len + 1);
        Self {
            pdata: data,
            null_terminated: true,
            free_func,
        }
    }

    /// Creates an array holding copies of `data`.
    pub fn new_from_slice(
        data: &[Option<T>],
        copy_func: impl FnMut(&T) -> T,
        free_func: Option<FreeFunc<T>>,
    ) -> Self {
        Self::new_from_elements(data, copy_func, free_func, false)
    }

    /// Creates a null-terminated array holding copies of `data` up to its
    /// first `None`, or of the whole slice if it has none.
    pub fn new_from_null_terminated(
        data: &[Option<T>],
        copy_func: impl FnMut(&T) -> T,
        free_func: Option<FreeFunc<T>>,
    ) -> Self {
        let len = data.iter().position(Option::is_none).unwrap_or(data.len());
        Self::new_from_elements(&data[..len], copy_func, free_func, true)
    }

    fn new_from_elements(
        data: &[Option<T>],
        mut copy_func: impl FnMut(&T) -> T,
        free_func: Option<FreeFunc<T>>,
        null_terminated: bool,
    ) -> Self {
        let mut array = Self::new_null_terminated(data.len(), free_func, null_terminated);
        array.with_unterminated(|pdata| {
            pdata.extend(data.iter().map(|item| item.as_ref().map(&mut copy_func)));
        });
        array
    }

    fn has_terminator(&self) -> bool {
        self.null_terminated && self.pdata.capacity() != 0
    }

    pub fn len(&self) -> usize {
        self.pdata.len() - usize::from(self.has_terminator())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of allocated slots, terminator slot included.
    pub fn capacity(&self) -> usize {
        self.pdata.capacity()
    }

    pub fn is_null_terminated(&self) -> bool {
        self.null_terminated
    }

    pub fn set_free_func(&mut self, free_func: Option<FreeFunc<T>>) {
        self.free_func = free_func;
    }

    pub fn has_free_func(&self) -> bool {
        self.free_func.is_some()
    }

    pub fn as_slice(&self) -> &[Option<T>] {
        &self.pdata[..self.len()]
    }

    pub fn as_mut_slice(&mut self) -> &mut [Option<T>] {
        let len = self.len();
        &mut self.pdata[..len]
    }

    /// Returns the elements followed by the terminator, if the array is
    /// null-terminated and allocated.
    pub fn as_terminated_slice(&self) -> Option<&[Option<T>]> {
        self.has_terminator().then_some(self.pdata.as_slice())
    }

    /// Returns the pointer to the first slot.
    ///
    /// When the array is null-terminated and allocated, the elements are
    /// followed by a `None`.
    pub fn as_ptr(&self) -> *const Option<T> {
        self.pdata.as_ptr()
    }

    pub fn iter(&self) -> slice::Iter<'_, Option<T>> {
        self.as_slice().iter()
    }

    #[track_caller]
    pub fn get(&self, index: usize) -> Option<&T> {
        self[index].as_ref()
    }

    /// Reserves room for `additional` more elements.
    ///
    /// Aborts the process if the resulting length would exceed the size limits.
    pub fn reserve(&mut self, additional: usize) {
        if let Some(growth) = growth::grow(
            self.len(),
            self.pdata.capacity(),
            additional,
            slot_size::<T>(),
            self.null_terminated,
        ) {
            self.pdata.reserve_exact(growth.capacity - self.pdata.len());
        }
        if self.null_terminated && self.pdata.is_empty() {
            self.pdata.push(None);
        }
    }

    // Runs `f` on the elements alone, then restores the terminator. Room for
    // the terminator must have been reserved beforehand.
    fn with_unterminated<R>(&mut self, f: impl FnOnce(&mut Vec<Option<T>>) -> R) -> R {
        if self.has_terminator() {
            self.pdata.pop();
        }
        let res = f(&mut self.pdata);
        if self.null_terminated && self.pdata.capacity() != 0 {
            self.pdata.push(None);
        }
        res
    }

    fn free_element(&self, item: Option<T>) {
        if let (Some(free_func), Some(item)) = (&self.free_func, item) {
            free_func(item);
        }
    }

    fn take_elements(&mut self) -> Vec<Option<T>> {
        let terminated = self.has_terminator();
        let mut pdata = mem::take(&mut self.pdata);
        if terminated {
            pdata.pop();
        }
        pdata
    }

    /// Appends an element.
    pub fn add(&mut self, item: Option<T>) {
        self.reserve(1);
        self.with_unterminated(|pdata| pdata.push(item));
    }

    /// Inserts an element at `index`, or appends it when `index` is `None`.
    #[track_caller]
    pub fn insert(&mut self, index: Option<usize>, item: Option<T>) {
        let len = self.len();
        let index = index.unwrap_or(len);
        if index > len {
            panic_out_of_range(index, len);
        }
        self.reserve(1);
        self.with_unterminated(|pdata| pdata.insert(index, item));
    }

    /// Sets the length of the array.
    ///
    /// Growing appends `None` elements; shrinking discards the trailing
    /// elements in index order.
    pub fn set_size(&mut self, len: usize) {
        let cur = self.len();
        match len.cmp(&cur) {
            Ordering::Greater => {
                self.reserve(len - cur);
                self.with_unterminated(|pdata| pdata.resize_with(len, || None));
            }
            Ordering::Less => self.remove_range(len, cur - len),
            Ordering::Equal => {}
        }
    }

    /// Removes the element at `index` and discards it.
    #[track_caller]
    pub fn remove_index(&mut self, index: usize, removal: Removal) {
        let item = self.take_index(index, removal);
        self.free_element(item);
    }

    /// Removes the element at `index` and returns it, without calling the
    /// free function.
    #[track_caller]
    pub fn steal_index(&mut self, index: usize, removal: Removal) -> Option<T> {
        self.take_index(index, removal)
    }

    #[track_caller]
    fn take_index(&mut self, index: usize, removal: Removal) -> Option<T> {
        let len = self.len();
        if index >= len {
            panic_out_of_range(index, len);
        }
        self.with_unterminated(|pdata| match removal {
            Removal::Preserve => pdata.remove(index),
            Removal::Swap => pdata.swap_remove(index),
        })
    }

    /// Removes `count` elements starting at `index`, discarding each of them.
    #[track_caller]
    pub fn remove_range(&mut self, index: usize, count: usize) {
        let len = self.len();
        if index > len || count > len - index {
            panic!(
                "range {index}..{} out of range for array of length {len}",
                index.saturating_add(count),
            );
        }
        if count == 0 {
            return;
        }
        let removed: Vec<_> =
            self.with_unterminated(|pdata| pdata.drain(index..index + count).collect());
        for item in removed {
            self.free_element(item);
        }
    }

    /// Removes the first element equal to `item`, discarding it.
    ///
    /// Returns `true` if an element was found.
    pub fn remove(&mut self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.remove_first(item, Removal::Preserve)
    }

    /// Like [`remove`](Self::remove), filling the gap with the last element.
    pub fn remove_fast(&mut self, item: &T) -> bool
    where
        T: PartialEq,
    {
        self.remove_first(item, Removal::Swap)
    }

    fn remove_first(&mut self, item: &T, removal: Removal) -> bool
    where
        T: PartialEq,
    {
        match self.find(item) {
            Some(index) => {
                self.remove_index(index, removal);
                true
            }
            None => false,
        }
    }

    /// Appends copies of the elements of `other`.
    pub fn extend(&mut self, other: &PtrArray<T>, mut copy_func: impl FnMut(&T) -> T) {
        if other.is_empty() {
            return;
        }
        self.reserve(other.len());
        self.with_unterminated(|pdata| {
            pdata.extend(other.iter().map(|item| item.as_ref().map(&mut copy_func)));
        });
    }

    /// Moves the elements of `other` to the end of this array.
    ///
    /// `other` is destroyed without discarding the moved elements.
    pub fn extend_and_steal(&mut self, mut other: PtrArray<T>) {
        let items = other.take_elements();
        if items.is_empty() {
            return;
        }
        self.reserve(items.len());
        self.with_unterminated(|pdata| pdata.extend(items));
    }

    /// Copies the array, sharing its free function.
    ///
    /// Storage is only allocated for the copy if this array is allocated.
    pub fn copy(&self, mut copy_func: impl FnMut(&T) -> T) -> Self {
        let mut copy = Self::new_null_terminated(0, self.free_func.clone(), self.null_terminated);
        if self.pdata.capacity() != 0 {
            copy.reserve(self.len());
            copy.with_unterminated(|pdata| {
                pdata.extend(self.iter().map(|item| item.as_ref().map(&mut copy_func)));
            });
        }
        copy
    }

    /// Sorts the elements with a stable sort.
    ///
    /// The comparator receives references to the stored slots.
    pub fn sort(&mut self, compare: impl FnMut(&Option<T>, &Option<T>) -> Ordering) {
        self.as_mut_slice().sort_by(compare);
    }

    pub fn sort_with_data<D: ?Sized>(
        &mut self,
        data: &D,
        mut compare: impl FnMut(&Option<T>, &Option<T>, &D) -> Ordering,
    ) {
        self.sort(|a, b| compare(a, b, data));
    }

    /// Sorts the elements with a stable sort, the comparator receiving the
    /// values themselves.
    pub fn sort_values(&mut self, mut compare: impl FnMut(Option<&T>, Option<&T>) -> Ordering) {
        self.sort(|a, b| compare(a.as_ref(), b.as_ref()));
    }

    pub fn sort_values_with_data<D: ?Sized>(
        &mut self,
        data: &D,
        mut compare: impl FnMut(Option<&T>, Option<&T>, &D) -> Ordering,
    ) {
        self.sort(|a, b| compare(a.as_ref(), b.as_ref(), data));
    }

    /// Returns the index of the first element equal to `needle`.
    pub fn find(&self, needle: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        self.find_with_equal_func(needle, |item, needle| item == Some(needle))
    }

    /// Returns the index of the first element for which `equal` holds.
    pub fn find_with_equal_func<N: ?Sized>(
        &self,
        needle: &N,
        mut equal: impl FnMut(Option<&T>, &N) -> bool,
    ) -> Option<usize> {
        self.iter().position(|item| equal(item.as_ref(), needle))
    }

    pub fn foreach(&self, mut f: impl FnMut(Option<&T>)) {
        for item in self.iter() {
            f(item.as_ref());
        }
    }

    /// Takes the storage, leaving the array empty and unallocated.
    ///
    /// The returned vector ends with the terminator when the array is
    /// null-terminated and was allocated. The free function is not called.
    pub fn steal(&mut self) -> Vec<Option<T>> {
        mem::take(&mut self.pdata)
    }

    /// Destroys the array.
    ///
    /// With `free_segment`, the elements are discarded; otherwise the storage
    /// is returned, always terminated for a null-terminated array.
    pub fn free(mut self, free_segment: bool) -> Option<Vec<Option<T>>> {
        self.release(free_segment)
    }
}

impl<T> Release for PtrArray<T> {
    type Segment = Vec<Option<T>>;

    fn release(&mut self, free_segment: bool) -> Option<Vec<Option<T>>> {
        if free_segment {
            for item in self.take_elements() {
                self.free_element(item);
            }
            return None;
        }
        let pdata = self.steal();
        if pdata.capacity() == 0 && self.null_terminated {
            return Some(vec![None]);
        }
        Some(pdata)
    }
}

impl<T> Drop for PtrArray<T> {
    fn drop(&mut self) {
        for item in self.take_elements() {
            self.free_element(item);
        }
    }
}

impl<T> Default for PtrArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for PtrArray<T> {
    fn clone(&self) -> Self {
        self.copy(T::clone)
    }
}

impl<T> Index<usize> for PtrArray<T> {
    type Output = Option<T>;

    #[track_caller]
    fn index(&self, index: usize) -> &Self::Output {
        let len = self.len();
        if index >= len {
            panic_out_of_range(index, len);
        }
        &self.pdata[index]
    }
}

impl<'a, T> IntoIterator for &'a PtrArray<T> {
    type Item = &'a Option<T>;
    type IntoIter = slice::Iter<'a, Option<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> FromIterator<Option<T>> for PtrArray<T> {
    fn from_iter<I: IntoIterator<Item = Option<T>>>(iter: I) -> Self {
        let mut array = Self::new();
        for item in iter {
            array.add(item);
        }
        array
    }
}

impl<T: PartialEq> PartialEq for PtrArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: fmt::Debug> fmt::Debug for PtrArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
