//! Sorting and searching over strided element storage.

use alloc::vec::Vec;
use core::cmp::Ordering;

/// Stable sort of `bytes`, viewed as consecutive elements of `elt_size` bytes.
///
/// The permutation is computed with the standard (stable) slice sort over
/// element indices, then applied in a single pass.
pub(crate) fn stable_sort_by(
    bytes: &mut [u8],
    elt_size: usize,
    mut compare: impl FnMut(&[u8], &[u8]) -> Ordering,
) {
    debug_assert_eq!(bytes.len() % elt_size, 0);
    let len = bytes.len() / elt_size;
    if len < 2 {
        return;
    }
    let view: &[u8] = bytes;
    let mut order: Vec<usize> = (0..len).collect();
    order.sort_by(|&a, &b| compare(element(view, elt_size, a), element(view, elt_size, b)));
    if order.iter().enumerate().all(|(i, &j)| i == j) {
        return;
    }
    let sorted: Vec<u8> = order
        .iter()
        .flat_map(|&i| element(view, elt_size, i))
        .copied()
        .collect();
    bytes.copy_from_slice(&sorted);
}

fn element(bytes: &[u8], elt_size: usize, index: usize) -> &[u8] {
    &bytes[index * elt_size..(index + 1) * elt_size]
}

/// Lower-bound binary search over `len` sorted elements.
///
/// `compare(i)` orders element `i` against the target. Among equal elements,
/// the one with the lowest index is returned.
pub(crate) fn binary_search_by(
    len: usize,
    mut compare: impl FnMut(usize) -> Ordering,
) -> Option<usize> {
    let (mut left, mut right) = (0, len);
    while left < right {
        let middle = left + (right - left) / 2;
        if compare(middle) == Ordering::Less {
            left = middle + 1;
        } else {
            right = middle;
        }
    }
    (left < len && compare(left) == Ordering::Equal).then_some(left)
}
