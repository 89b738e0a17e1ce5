#![cfg_attr(not(test), no_std)]
//! Growable arrays with explicit element size, nullable owned references and
//! bytes, shareable across threads through an atomic reference count, plus
//! crash-consistent replacement of file contents.
//!
//! ```rust
//! use arc_array::{ArcByteArray, ByteArray};
//!
//! let shared = ArcByteArray::new(ByteArray::from("Hello"));
//! let other = shared.clone();
//! other.borrow_mut().append(b" world");
//! assert_eq!(*shared.borrow(), b"Hello world");
//! assert_eq!(shared.ref_count(), 2);
//! ```
extern crate alloc;
#[cfg(all(feature = "std", not(test)))]
extern crate std;

mod arc;
mod array;
#[cfg(feature = "bstr")]
mod bstr;
mod byte_array;
#[cfg(feature = "bytes")]
mod bytes;
#[cfg(feature = "std")]
pub mod error;
#[cfg(feature = "std")]
pub mod file;
mod growth;
mod loom;
mod macros;
mod ptr_array;
mod raw;
mod segment;
#[cfg(feature = "serde")]
mod serde;
mod sort;
mod utils;

pub use crate::{
    arc::{ArcCell, Ref, RefMut, Release},
    array::{Array, ClearFunc, Removal},
    byte_array::ByteArray,
    ptr_array::{FreeFunc, PtrArray},
    segment::Segment,
};

/// A shared [`Array`].
pub type ArcArray = ArcCell<Array>;
/// A shared [`PtrArray`].
pub type ArcPtrArray<T> = ArcCell<PtrArray<T>>;
/// A shared [`ByteArray`].
pub type ArcByteArray = ArcCell<ByteArray>;
