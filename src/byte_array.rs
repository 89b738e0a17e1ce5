use alloc::{string::String, vec::Vec};
use core::{
    borrow::{Borrow, BorrowMut},
    cmp::Ordering,
    fmt,
    ops::{Deref, DerefMut},
};

use crate::{
    arc::Release,
    array::{Array, Removal},
    segment::Segment,
    utils::{debug_bytes, lower_hex, upper_hex},
};

/// A growable array of bytes.
///
/// ```rust
/// use arc_array::{ByteArray, Removal};
///
/// let mut bytes = ByteArray::new();
/// bytes.append(b"world");
/// bytes.prepend(b"hello ");
/// bytes.remove_index(5, Removal::Preserve);
/// assert_eq!(bytes, b"helloworld");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ByteArray(Array);

impl ByteArray {
    pub fn new() -> Self {
        Self::sized_new(0)
    }

    pub fn sized_new(reserved: usize) -> Self {
        Self(Array::sized_new(false, false, 1, reserved))
    }

    /// Creates a byte array owning `data`.
    ///
    /// A [`Segment`] is adopted without copying; a `Vec<u8>` is copied into a
    /// new aligned allocation.
    pub fn new_take(data: impl Into<Segment>) -> Self {
        Self(Array::new_take(data, false, 1))
    }

    pub fn as_array(&self) -> &Array {
        &self.0
    }

    #[cfg(feature = "bytes")]
    pub(crate) fn as_array_mut(&mut self) -> &mut Array {
        &mut self.0
    }

    pub fn into_array(self) -> Array {
        self.0
    }

    pub fn capacity(&self) -> usize {
        self.0.capacity()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.0.as_bytes_mut()
    }

    pub fn reserve(&mut self, additional: usize) {
        self.0.reserve(additional);
    }

    pub fn append(&mut self, data: &[u8]) {
        self.0.append_vals(data);
    }

    pub fn prepend(&mut self, data: &[u8]) {
        self.0.prepend_vals(data);
    }

    pub fn insert(&mut self, index: usize, data: &[u8]) {
        self.0.insert_vals(index, data);
    }

    /// Sets the length; new bytes hold zeroes or stale data.
    pub fn set_size(&mut self, len: usize) {
        self.0.set_size(len);
    }

    #[track_caller]
    pub fn remove_index(&mut self, index: usize, removal: Removal) {
        self.0.remove_index(index, removal);
    }

    #[track_caller]
    pub fn remove_range(&mut self, index: usize, count: usize) {
        self.0.remove_range(index, count);
    }

    /// Sorts the bytes with a stable sort.
    pub fn sort(&mut self, compare: impl FnMut(&u8, &u8) -> Ordering) {
        self.as_mut_slice().sort_by(compare);
    }

    pub fn sort_with_data<D: ?Sized>(
        &mut self,
        data: &D,
        mut compare: impl FnMut(&u8, &u8, &D) -> Ordering,
    ) {
        self.sort(|a, b| compare(a, b, data));
    }

    /// Takes the storage, leaving the array empty and unallocated.
    pub fn steal(&mut self) -> Segment {
        self.0.steal()
    }

    /// Destroys the array, returning its storage unless `free_segment` is set.
    pub fn free(self, free_segment: bool) -> Option<Segment> {
        self.0.free(free_segment)
    }
}

impl Release for ByteArray {
    type Segment = Segment;

    fn release(&mut self, free_segment: bool) -> Option<Segment> {
        self.0.release(free_segment)
    }
}

impl Default for ByteArray {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for ByteArray {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl DerefMut for ByteArray {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl AsRef<[u8]> for ByteArray {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl AsMut<[u8]> for ByteArray {
    fn as_mut(&mut self) -> &mut [u8] {
        self
    }
}

impl Borrow<[u8]> for ByteArray {
    fn borrow(&self) -> &[u8] {
        self
    }
}

impl BorrowMut<[u8]> for ByteArray {
    fn borrow_mut(&mut self) -> &mut [u8] {
        self
    }
}

impl PartialEq<[u8]> for ByteArray {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_slice() == other
    }
}

impl<const N: usize> PartialEq<[u8; N]> for ByteArray {
    fn eq(&self, other: &[u8; N]) -> bool {
        self.as_slice() == other
    }
}

impl<const N: usize> PartialEq<&[u8; N]> for ByteArray {
    fn eq(&self, other: &&[u8; N]) -> bool {
        self.as_slice() == *other
    }
}

impl PartialEq<&[u8]> for ByteArray {
    fn eq(&self, other: &&[u8]) -> bool {
        self.as_slice() == *other
    }
}

impl PartialEq<Vec<u8>> for ByteArray {
    fn eq(&self, other: &Vec<u8>) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl PartialOrd for ByteArray {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ByteArray {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

impl core::hash::Hash for ByteArray {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

impl fmt::Debug for ByteArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_bytes(self, f)
    }
}

impl fmt::LowerHex for ByteArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        lower_hex(self, f)
    }
}

impl fmt::UpperHex for ByteArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        upper_hex(self, f)
    }
}

impl fmt::Write for ByteArray {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.append(s.as_bytes());
        Ok(())
    }
}

impl Extend<u8> for ByteArray {
    fn extend<I: IntoIterator<Item = u8>>(&mut self, iter: I) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for byte in iter {
            self.append(&[byte]);
        }
    }
}

impl<'a> Extend<&'a u8> for ByteArray {
    fn extend<I: IntoIterator<Item = &'a u8>>(&mut self, iter: I) {
        self.extend(iter.into_iter().copied());
    }
}

impl FromIterator<u8> for ByteArray {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        let mut bytes = Self::new();
        bytes.extend(iter);
        bytes
    }
}

impl From<&[u8]> for ByteArray {
    fn from(value: &[u8]) -> Self {
        let mut bytes = Self::sized_new(value.len());
        bytes.append(value);
        bytes
    }
}

impl<const N: usize> From<&[u8; N]> for ByteArray {
    fn from(value: &[u8; N]) -> Self {
        Self::from(&value[..])
    }
}

impl From<&str> for ByteArray {
    fn from(value: &str) -> Self {
        value.as_bytes().into()
    }
}

impl From<Vec<u8>> for ByteArray {
    fn from(value: Vec<u8>) -> Self {
        Self::new_take(value)
    }
}

impl From<String> for ByteArray {
    fn from(value: String) -> Self {
        value.into_bytes().into()
    }
}

impl From<Segment> for ByteArray {
    fn from(value: Segment) -> Self {
        Self::new_take(value)
    }
}

impl From<ByteArray> for Vec<u8> {
    fn from(value: ByteArray) -> Self {
        value.as_slice().to_vec()
    }
}

/// # Panics
///
/// Panics if the element size is not one byte.
impl From<Array> for ByteArray {
    #[track_caller]
    fn from(value: Array) -> Self {
        assert_eq!(value.element_size(), 1, "element size mismatch");
        Self(value)
    }
}

#[cfg(feature = "std")]
impl std::io::Write for ByteArray {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.append(buf);
        Ok(buf.len())
    }

    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.append(buf);
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
