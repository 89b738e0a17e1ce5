//! Capacity growth shared by every array flavor.

use core::cmp;

use crate::{macros::error, utils::abort};

/// Smallest allocation handed to the allocator, in bytes.
pub(crate) const MIN_ARRAY_SIZE: usize = 16;
/// Element counts are bounded like a 32-bit length field.
pub(crate) const MAX_ELEMENTS: usize = u32::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Growth {
    /// New capacity, in elements.
    pub(crate) capacity: usize,
    /// New allocation size, in bytes.
    pub(crate) bytes: usize,
}

/// Largest element count an array of `elt_size` may hold, terminator slot excluded.
pub(crate) fn max_len(elt_size: usize, terminated: bool) -> usize {
    cmp::min(usize::MAX / 2 / elt_size, MAX_ELEMENTS) - usize::from(terminated)
}

/// Computes the reallocation needed to make room for `additional` elements.
///
/// Returns `None` when the current capacity already fits. Aborts the process
/// when the request would overflow the size limits.
pub(crate) fn grow(
    len: usize,
    capacity: usize,
    additional: usize,
    elt_size: usize,
    terminated: bool,
) -> Option<Growth> {
    debug_assert!(elt_size > 0);
    let max_len = max_len(elt_size, terminated);
    if max_len.saturating_sub(len) < additional {
        overflow(additional);
    }
    let want_len = len + additional + usize::from(terminated);
    if want_len <= capacity {
        return None;
    }
    // cannot overflow: want_len * elt_size <= usize::MAX / 2
    let want_bytes = want_len * elt_size;
    let bytes = cmp::max(want_bytes.next_power_of_two(), MIN_ARRAY_SIZE);
    Some(Growth {
        capacity: cmp::min(bytes / elt_size, MAX_ELEMENTS),
        bytes,
    })
}

#[cold]
#[inline(never)]
#[cfg_attr(not(any(feature = "std", feature = "tracing")), allow(unused_variables))]
fn overflow(additional: usize) -> ! {
    error!(additional, "adding {additional} to array would overflow");
    #[cfg(feature = "std")]
    std::eprintln!("adding {additional} to array would overflow");
    abort()
}
