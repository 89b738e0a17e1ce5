use alloc::boxed::Box;
use core::{
    cell::UnsafeCell,
    fmt,
    marker::PhantomData,
    mem::ManuallyDrop,
    ops::{Deref, DerefMut},
    ptr::NonNull,
};

use crate::{
    loom::sync::{
        atomic,
        atomic::{AtomicUsize, Ordering},
    },
    utils::abort,
};

/// Containers whose storage can be released while the container survives.
pub trait Release {
    /// Storage handed back to the caller.
    type Segment;

    /// Empties the container.
    ///
    /// With `free_segment`, the elements are discarded and the storage
    /// deallocated; otherwise the storage is returned and the elements
    /// become the caller's.
    fn release(&mut self, free_segment: bool) -> Option<Self::Segment>;
}

const UNBORROWED: usize = 0;
const EXCLUSIVE: usize = usize::MAX;
const MAX_REFCOUNT: usize = isize::MAX as usize;

struct ArcInner<A> {
    rc: AtomicUsize,
    // number of shared borrows, or `EXCLUSIVE`
    borrow: AtomicUsize,
    value: UnsafeCell<A>,
}

// SAFETY: access to `value` is synchronized by the `borrow` flag
unsafe impl<A: Send + Sync> Send for ArcInner<A> {}
// SAFETY: same as above
unsafe impl<A: Send + Sync> Sync for ArcInner<A> {}

/// A thread-safe reference-counted container.
///
/// Cloning increments the reference count atomically, dropping decrements it,
/// and the contained value is destroyed at the transition to zero, by the
/// last holder only.
///
/// Mutation goes through [`borrow_mut`](Self::borrow_mut), guarded by an
/// atomic borrow flag. Borrowing never blocks: a conflicting borrow is a
/// programming error and panics, as concurrent mutation of a shared array
/// must be serialized by the caller.
///
/// ```rust
/// use arc_array::{Array, ArcArray};
///
/// let array = ArcArray::new(Array::for_type::<u64>(false, false));
/// let other = array.clone();
/// array.borrow_mut().append_val(42u64);
/// assert_eq!(other.borrow().as_slice::<u64>(), [42]);
/// assert_eq!(other.ref_count(), 2);
/// ```
pub struct ArcCell<A> {
    inner: NonNull<ArcInner<A>>,
    _phantom: PhantomData<ArcInner<A>>,
}

// SAFETY: `ArcInner` is `Send + Sync` under the same bounds
unsafe impl<A: Send + Sync> Send for ArcCell<A> {}
// SAFETY: same as above
unsafe impl<A: Send + Sync> Sync for ArcCell<A> {}

impl<A> ArcCell<A> {
    pub fn new(value: A) -> Self {
        let inner = Box::new(ArcInner {
            rc: AtomicUsize::new(1),
            borrow: AtomicUsize::new(UNBORROWED),
            value: UnsafeCell::new(value),
        });
        Self {
            inner: NonNull::from(Box::leak(inner)),
            _phantom: PhantomData,
        }
    }

    fn inner(&self) -> &ArcInner<A> {
        // SAFETY: the allocation lives as long as one reference exists
        unsafe { self.inner.as_ref() }
    }

    /// Returns the current number of references.
    pub fn ref_count(&self) -> usize {
        self.inner().rc.load(Ordering::Acquire)
    }

    /// Returns `true` if both handles reference the same container.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }

    /// Borrows the value, or returns `None` if it is mutably borrowed.
    pub fn try_borrow(&self) -> Option<Ref<'_, A>> {
        let borrow = &self.inner().borrow;
        let mut state = borrow.load(Ordering::Relaxed);
        loop {
            if state >= EXCLUSIVE - 1 {
                return None;
            }
            match borrow.compare_exchange_weak(
                state,
                state + 1,
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => state = actual,
            }
        }
        Some(Ref {
            inner: self.inner(),
        })
    }

    /// Borrows the value.
    ///
    /// # Panics
    ///
    /// Panics if the value is mutably borrowed.
    #[track_caller]
    pub fn borrow(&self) -> Ref<'_, A> {
        match self.try_borrow() {
            Some(guard) => guard,
            None => panic!("already mutably borrowed"),
        }
    }

    /// Mutably borrows the value, or returns `None` if it is borrowed.
    pub fn try_borrow_mut(&self) -> Option<RefMut<'_, A>> {
        let inner = self.inner();
        inner
            .borrow
            .compare_exchange(UNBORROWED, EXCLUSIVE, Ordering::Acquire, Ordering::Relaxed)
            .ok()?;
        Some(RefMut { inner })
    }

    /// Mutably borrows the value.
    ///
    /// # Panics
    ///
    /// Panics if the value is borrowed.
    #[track_caller]
    pub fn borrow_mut(&self) -> RefMut<'_, A> {
        match self.try_borrow_mut() {
            Some(guard) => guard,
            None => panic!("already borrowed"),
        }
    }

    /// Returns a mutable reference if this is the only reference.
    pub fn get_mut(&mut self) -> Option<&mut A> {
        if self.inner().rc.load(Ordering::Acquire) != 1 {
            return None;
        }
        // SAFETY: the reference is unique, and guards borrow `self`
        Some(unsafe { &mut *self.inner().value.get() })
    }

    /// Returns the value if this is the only reference.
    pub fn try_unwrap(self) -> Result<A, Self> {
        let inner = self.inner();
        if inner
            .rc
            .compare_exchange(1, 0, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(self);
        }
        let this = ManuallyDrop::new(self);
        // SAFETY: the reference count dropped to zero, the allocation is ours
        let inner = unsafe { Box::from_raw(this.inner.as_ptr()) };
        Ok(inner.value.into_inner())
    }
}

impl<A: Release> ArcCell<A> {
    /// Releases the storage and drops this reference.
    ///
    /// If other references remain, the container survives, emptied; the
    /// storage is released either way. With `free_segment` the elements are
    /// discarded, otherwise the storage is returned.
    ///
    /// # Panics
    ///
    /// Panics if the value is borrowed.
    #[track_caller]
    pub fn free(self, free_segment: bool) -> Option<A::Segment> {
        let segment = self.borrow_mut().release(free_segment);
        drop(self);
        segment
    }
}

impl<A> Clone for ArcCell<A> {
    fn clone(&self) -> Self {
        let old_count = self.inner().rc.fetch_add(1, Ordering::Relaxed);
        if old_count > MAX_REFCOUNT {
            refcount_overflow(self.inner());
        }
        Self {
            inner: self.inner,
            _phantom: PhantomData,
        }
    }
}

#[cold]
fn refcount_overflow<A>(inner: &ArcInner<A>) -> ! {
    if cfg!(feature = "abort-on-refcount-overflow") {
        abort();
    }
    inner.rc.fetch_sub(1, Ordering::Relaxed);
    panic!("reference count overflow");
}

impl<A> Drop for ArcCell<A> {
    fn drop(&mut self) {
        if self.inner().rc.fetch_sub(1, Ordering::Release) != 1 {
            return;
        }
        atomic::fence(Ordering::Acquire);
        // SAFETY: last reference, the allocation comes from `Box::leak`
        drop(unsafe { Box::from_raw(self.inner.as_ptr()) });
    }
}

impl<A: Default> Default for ArcCell<A> {
    fn default() -> Self {
        Self::new(A::default())
    }
}

impl<A> From<A> for ArcCell<A> {
    fn from(value: A) -> Self {
        Self::new(value)
    }
}

impl<A: fmt::Debug> fmt::Debug for ArcCell<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_borrow() {
            Some(value) => f.debug_tuple("ArcCell").field(&*value).finish(),
            None => f.write_str("ArcCell(<borrowed>)"),
        }
    }
}

/// Shared borrow of an [`ArcCell`] value.
pub struct Ref<'a, A> {
    inner: &'a ArcInner<A>,
}

impl<A> Deref for Ref<'_, A> {
    type Target = A;

    fn deref(&self) -> &A {
        // SAFETY: the borrow flag excludes mutable borrows
        unsafe { &*self.inner.value.get() }
    }
}

impl<A> Drop for Ref<'_, A> {
    fn drop(&mut self) {
        self.inner.borrow.fetch_sub(1, Ordering::Release);
    }
}

impl<A: fmt::Debug> fmt::Debug for Ref<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}

/// Exclusive borrow of an [`ArcCell`] value.
pub struct RefMut<'a, A> {
    inner: &'a ArcInner<A>,
}

impl<A> Deref for RefMut<'_, A> {
    type Target = A;

    fn deref(&self) -> &A {
        // SAFETY: the borrow flag grants exclusive access
        unsafe { &*self.inner.value.get() }
    }
}

impl<A> DerefMut for RefMut<'_, A> {
    fn deref_mut(&mut self) -> &mut A {
        // SAFETY: the borrow flag grants exclusive access
        unsafe { &mut *self.inner.value.get() }
    }
}

impl<A> Drop for RefMut<'_, A> {
    fn drop(&mut self) {
        self.inner.borrow.store(UNBORROWED, Ordering::Release);
    }
}

impl<A: fmt::Debug> fmt::Debug for RefMut<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (**self).fmt(f)
    }
}
