#[cfg(not(all(loom, test)))]
#[cfg(not(feature = "portable-atomic"))]
pub(crate) use core::sync;

#[cfg(not(all(loom, test)))]
#[cfg(feature = "portable-atomic")]
pub(crate) mod sync {
    pub(crate) mod atomic {
        pub(crate) use core::sync::atomic::fence;
        pub(crate) use portable_atomic::{AtomicUsize, Ordering};
    }
}

#[cfg(all(loom, test))]
pub(crate) use loom::sync;

#[cfg(all(loom, test))]
mod tests {
    use loom::thread;

    use crate::{ArcArray, Array};

    #[test]
    fn arc_array_concurrent_ref_unref() {
        loom::model(|| {
            let array = ArcArray::new(Array::new(false, false, 4));
            let array2 = array.clone();
            let thread = thread::spawn(move || {
                assert_eq!(array2.borrow().element_size(), 4);
                drop(array2.clone());
            });
            let clone = array.clone();
            drop(array);
            thread.join().unwrap();
            assert_eq!(clone.ref_count(), 1);
        });
    }
}
