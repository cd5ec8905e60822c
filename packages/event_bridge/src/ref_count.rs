use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::atomic::{self, AtomicUsize};

/// Combines a value and a thread-safe reference count.
#[derive(Debug)]
pub(crate) struct WithRefCount<T> {
    value: T,
    ref_count: AtomicUsize,
}

impl<T> WithRefCount<T> {
    /// Creates a new reference-counted wrapper around `T`, owned by a single reference.
    #[must_use]
    pub(crate) fn new(value: T) -> Self {
        Self {
            value,
            ref_count: AtomicUsize::new(1),
        }
    }

    /// Increments the reference count and returns the new count.
    ///
    /// # Panics
    ///
    /// Panics if the reference count would overflow.
    ///
    /// Panics if the reference count was zero (indicating resurrection).
    pub(crate) fn retain(&self) -> usize {
        // Creating a new reference from an existing one needs no synchronization with other
        // threads - the existing reference already keeps the value alive.
        let previous = self.ref_count.fetch_add(1, atomic::Ordering::Relaxed);

        assert_ne!(
            0, previous,
            "reference count resurrection - indicates a serious bug in reference counting logic"
        );

        previous.checked_add(1).expect(
            "reference count overflow - indicates a serious bug in reference counting logic",
        )
    }

    /// Decrements the reference count and returns the new count.
    ///
    /// If the new count is zero, the caller held the last reference and is responsible for
    /// destroying the value.
    ///
    /// # Panics
    ///
    /// Panics if the reference count would underflow (go below zero).
    pub(crate) fn release(&self) -> usize {
        // Release ordering publishes our writes to whichever thread ends up destroying the value.
        let previous = self.ref_count.fetch_sub(1, atomic::Ordering::Release);

        let remaining = previous.checked_sub(1).expect(
            "reference count underflow - indicates a serious bug in reference counting logic",
        );

        if remaining == 0 {
            // Pairs with the Release above on every other thread that released a reference,
            // so the destroying thread observes all their writes before drop.
            atomic::fence(atomic::Ordering::Acquire);
        }

        remaining
    }

    /// Returns the current reference count.
    ///
    /// The value may be outdated by the time the caller looks at it if other threads hold
    /// references.
    #[must_use]
    pub(crate) fn ref_count(&self) -> usize {
        self.ref_count.load(atomic::Ordering::Relaxed)
    }
}

impl<T> Deref for WithRefCount<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

/// One reference to a heap-allocated value with a thread-safe reference count.
///
/// Cloning is expressed through [`retain()`][Self::retain] so callers can observe the new
/// count. Dropping or [`release()`][Self::release]-ing the last reference destroys the value.
pub(crate) struct RefCounted<T> {
    ptr: NonNull<WithRefCount<T>>,

    _owns: PhantomData<WithRefCount<T>>,
}

impl<T> RefCounted<T> {
    /// Moves `value` to the heap and returns the first reference to it.
    #[must_use]
    pub(crate) fn new(value: T) -> Self {
        let ptr = NonNull::from(Box::leak(Box::new(WithRefCount::new(value))));

        Self {
            ptr,
            _owns: PhantomData,
        }
    }

    fn inner(&self) -> &WithRefCount<T> {
        // SAFETY: We own one of the references, so the allocation stays alive at least as long
        // as we do.
        unsafe { self.ptr.as_ref() }
    }

    /// Creates a new reference to the same value, returning it together with the new count.
    #[must_use]
    pub(crate) fn retain(&self) -> (Self, usize) {
        let ref_count = self.inner().retain();

        (
            Self {
                ptr: self.ptr,
                _owns: PhantomData,
            },
            ref_count,
        )
    }

    /// Gives up this reference and returns the remaining count.
    ///
    /// If zero is returned, the value has been destroyed.
    pub(crate) fn release(self) -> usize {
        let this = ManuallyDrop::new(self);

        // SAFETY: `this` is never used again and its destructor does not run, so the reference
        // is released exactly once.
        unsafe { Self::release_ptr(this.ptr) }
    }

    #[must_use]
    pub(crate) fn ref_count(&self) -> usize {
        self.inner().ref_count()
    }

    /// # Safety
    ///
    /// The caller must own a reference to the value behind `ptr` and must not use it again
    /// after this call.
    unsafe fn release_ptr(ptr: NonNull<WithRefCount<T>>) -> usize {
        // SAFETY: The caller owns a reference, so the allocation is alive until we decrement.
        let remaining = unsafe { ptr.as_ref() }.release();

        if remaining == 0 {
            // SAFETY: That was the last reference and the allocation came from `Box::leak()`
            // in `new()`. Nobody else can observe the value anymore.
            drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        }

        remaining
    }
}

impl<T> Deref for RefCounted<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.inner()
    }
}

impl<T> Drop for RefCounted<T> {
    fn drop(&mut self) {
        // SAFETY: We own a reference and are being dropped, so we never use it again.
        unsafe {
            Self::release_ptr(self.ptr);
        }
    }
}

impl<T> fmt::Debug for RefCounted<T>
where
    T: fmt::Debug,
{
    #[cfg_attr(test, mutants::skip)] // No API contract for debug output.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("value", &**self)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

// SAFETY: References can be created and released from any thread because the count is atomic.
// The value itself is shared between threads, so it must be both `Send` and `Sync`.
unsafe impl<T> Send for RefCounted<T> where T: Send + Sync {}

// SAFETY: See `Send` above. A `&RefCounted<T>` only hands out `&T` and new references.
unsafe impl<T> Sync for RefCounted<T> where T: Send + Sync {}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;

    /// Counts how many times it has been dropped.
    #[derive(Debug)]
    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn with_ref_count_basic() {
        let wrapper = WithRefCount::new(42);
        assert_eq!(*wrapper, 42);
        assert_eq!(wrapper.ref_count(), 1);

        assert_eq!(wrapper.retain(), 2);
        assert_eq!(wrapper.ref_count(), 2);

        assert_eq!(wrapper.release(), 1);
        assert_eq!(wrapper.release(), 0); // Last reference dropped.
    }

    #[test]
    #[should_panic]
    fn retain_after_last_release_panics() {
        let wrapper = WithRefCount::new(42);
        assert_eq!(wrapper.release(), 0);

        wrapper.retain();
    }

    #[test]
    #[should_panic]
    fn release_below_zero_panics() {
        let wrapper = WithRefCount::new(42);
        assert_eq!(wrapper.release(), 0);

        wrapper.release();
    }

    #[test]
    fn retain_then_release_leaves_count_unchanged() {
        let first = RefCounted::new(42);

        let (second, count) = first.retain();
        assert_eq!(count, 2);

        assert_eq!(second.release(), 1);
        assert_eq!(first.ref_count(), 1);
    }

    #[test]
    fn value_destroyed_exactly_once_on_last_release() {
        let drops = Arc::new(AtomicUsize::new(0));
        let first = RefCounted::new(DropCounter(Arc::clone(&drops)));

        let others: Vec<_> = (0..5).map(|_| first.retain().0).collect();
        assert_eq!(first.ref_count(), 6);

        for other in others {
            assert_ne!(other.release(), 0);
            assert_eq!(drops.load(Ordering::Relaxed), 0);
        }

        assert_eq!(first.release(), 0);
        assert_eq!(drops.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn drop_releases_reference() {
        let drops = Arc::new(AtomicUsize::new(0));
        let first = RefCounted::new(DropCounter(Arc::clone(&drops)));
        let (second, _) = first.retain();

        drop(first);
        assert_eq!(second.ref_count(), 1);
        assert_eq!(drops.load(Ordering::Relaxed), 0);

        drop(second);
        assert_eq!(drops.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn concurrent_retain_release_destroys_once() {
        const THREADS: usize = 8;
        const ITERATIONS: usize = 1000;

        let drops = Arc::new(AtomicUsize::new(0));
        let root = RefCounted::new(DropCounter(Arc::clone(&drops)));

        let threads: Vec<_> = (0..THREADS)
            .map(|_| {
                let (reference, _) = root.retain();

                thread::spawn(move || {
                    for _ in 0..ITERATIONS {
                        let (extra, _) = reference.retain();
                        drop(extra);
                    }

                    drop(reference);
                })
            })
            .collect();

        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(drops.load(Ordering::Relaxed), 0);
        assert_eq!(root.release(), 0);
        assert_eq!(drops.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn thread_safety() {
        assert_impl_all!(WithRefCount<usize>: Send, Sync);
        assert_impl_all!(RefCounted<usize>: Send, Sync);
        assert_not_impl_any!(RefCounted<std::cell::Cell<usize>>: Send, Sync);
    }
}
