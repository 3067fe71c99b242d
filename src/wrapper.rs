use core::ptr::NonNull;

use tracing::trace;

use crate::deleter::Deleter;
use crate::domain::Domain;
use crate::err::NoThreadIndexAvailableError;
use crate::sync::{Arc, AtomicPtr, Ordering};
use crate::types::{SlotIndex, ThreadIndex, ThreadToken};

/// Claim the lowest [ThreadIndex] of `domain` which no handle owns yet.
fn find_next_available_thread_index<T, D: Deleter<T>>(
    domain: &Domain<T, D>,
) -> Result<ThreadIndex, NoThreadIndexAvailableError> {
    for (thread_index, slot) in domain.thread_index_slots.iter().enumerate() {
        let cas_result: Result<bool, bool> =
            slot.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire);
        if cas_result.is_ok() {
            trace!(thread_index, "registered thread with hazard domain");
            return Ok(thread_index);
        }
    }
    Err(NoThreadIndexAvailableError)
}

/// Clear every slot the departing thread published and give its index back.
///
/// Objects it retired but could not yet delete stay in its retire list; the next owner of the
/// index, or the domain's destruction, deletes them.
fn release_thread_index<T, D: Deleter<T>>(domain: &Domain<T, D>, token: &ThreadToken) {
    domain.clear(token);
    domain.thread_index_slots[token.index()].store(false, Ordering::Release);
    trace!(thread_index = token.index(), "released thread from hazard domain");
}

/// Generates the per-thread operations shared by every handle type.
macro_rules! handle_operations {
    () => {
        pub fn thread_index(&self) -> ThreadIndex {
            self.token.index()
        }

        /// See [Domain::protect].
        pub fn protect(&self, slot_index: SlotIndex, location: &AtomicPtr<T>) -> *mut T {
            self.domain().protect(&self.token, slot_index, location)
        }

        /// See [Domain::protect_ptr].
        pub fn protect_ptr(&self, slot_index: SlotIndex, ptr: *mut T) -> *mut T {
            self.domain().protect_ptr(&self.token, slot_index, ptr)
        }

        /// See [Domain::protect_release].
        pub fn protect_release(&self, slot_index: SlotIndex, ptr: *mut T) -> *mut T {
            self.domain().protect_release(&self.token, slot_index, ptr)
        }

        pub fn clear(&self) {
            self.domain().clear(&self.token)
        }

        pub fn clear_one(&self, slot_index: SlotIndex) {
            self.domain().clear_one(&self.token, slot_index)
        }

        /// See [Domain::retire].
        ///
        /// # Safety
        ///
        /// The same as [Domain::retire].
        pub unsafe fn retire(&mut self, ptr: NonNull<T>) {
            let (domain, token) = self.parts();
            // SAFETY: forwarded to the caller.
            unsafe { domain.retire(token, ptr) }
        }

        /// See [Domain::collect].
        pub fn collect(&mut self) -> usize {
            let (domain, token) = self.parts();
            domain.collect(token)
        }

        pub fn retired_len(&self) -> usize {
            self.domain().retired_len(&self.token)
        }
    };
}

/// A registration with a borrowed [Domain]. Dropping it clears its slots and frees its index.
#[derive(Debug)]
pub struct RefHandle<'a, T, D: Deleter<T>> {
    domain: &'a Domain<T, D>,
    token: ThreadToken,
}

impl<'a, T, D: Deleter<T>> RefHandle<'a, T, D> {
    pub fn construct(domain: &'a Domain<T, D>) -> Result<Self, NoThreadIndexAvailableError> {
        let thread_index: ThreadIndex = find_next_available_thread_index(domain)?;
        Ok(Self {
            domain,
            // SAFETY: the CAS above makes this handle the only owner of the index.
            token: unsafe { ThreadToken::new(thread_index) },
        })
    }

    fn domain(&self) -> &Domain<T, D> {
        self.domain
    }

    fn parts(&mut self) -> (&Domain<T, D>, &mut ThreadToken) {
        (self.domain, &mut self.token)
    }

    handle_operations!();
}

impl<'a, T, D: Deleter<T>> Drop for RefHandle<'a, T, D> {
    fn drop(&mut self) {
        release_thread_index(self.domain, &self.token);
    }
}

/// A registration with a shared [Domain], for threads which outlive any one borrow.
#[derive(Debug)]
pub struct ArcHandle<T, D: Deleter<T>> {
    domain: Arc<Domain<T, D>>,
    token: ThreadToken,
}

impl<T, D: Deleter<T>> ArcHandle<T, D> {
    pub fn construct(domain: Arc<Domain<T, D>>) -> Result<Self, NoThreadIndexAvailableError> {
        let thread_index: ThreadIndex = find_next_available_thread_index(domain.as_ref())?;
        Ok(Self {
            domain,
            // SAFETY: the CAS above makes this handle the only owner of the index.
            token: unsafe { ThreadToken::new(thread_index) },
        })
    }

    fn domain(&self) -> &Domain<T, D> {
        self.domain.as_ref()
    }

    fn parts(&mut self) -> (&Domain<T, D>, &mut ThreadToken) {
        (self.domain.as_ref(), &mut self.token)
    }

    handle_operations!();
}

impl<T, D: Deleter<T>> Drop for ArcHandle<T, D> {
    fn drop(&mut self) {
        release_thread_index(self.domain.as_ref(), &self.token);
    }
}

#[cfg(all(test, feature = "std", not(feature = "shuttle"), not(loom)))]
mod tests {
    use crate::config::Config;
    use crate::deleter::DropBox;
    use crate::domain::Domain;
    use crate::err::NoThreadIndexAvailableError;
    use crate::sync::{Arc, AtomicPtr, AtomicUsize, Ordering};
    use crate::wrapper::{ArcHandle, RefHandle};
    use core::ptr::NonNull;
    use std::thread;
    use test_log::test;

    #[test]
    fn test_arc_handle_thread_reservation() {
        let domain: Domain<u64> = Domain::new(Config::with_max_threads(3, 1), DropBox).unwrap();
        let domain_arc: Arc<Domain<u64>> = Arc::new(domain);

        let first_handle: ArcHandle<u64, DropBox> =
            ArcHandle::construct(domain_arc.clone()).unwrap();
        assert_eq!(first_handle.thread_index(), 0);
        {
            let second_handle = ArcHandle::construct(domain_arc.clone()).unwrap();
            assert_eq!(second_handle.thread_index(), 1);
        }
        // the second handle has been dropped - index 1 should be available again
        let second_handle: ArcHandle<u64, DropBox> =
            ArcHandle::construct(domain_arc.clone()).unwrap();
        assert_eq!(second_handle.thread_index(), 1);

        let third_handle: ArcHandle<u64, DropBox> =
            ArcHandle::construct(domain_arc.clone()).unwrap();
        assert_eq!(third_handle.thread_index(), 2);

        // now there should be no indices left
        let result: Result<ArcHandle<u64, DropBox>, NoThreadIndexAvailableError> =
            ArcHandle::construct(domain_arc.clone());
        assert!(matches!(result, Err(NoThreadIndexAvailableError)));
    }

    #[test]
    fn test_ref_handle_thread_reservation() {
        let domain: Domain<u64> = Domain::new(Config::with_max_threads(2, 1), DropBox).unwrap();

        let first_handle: RefHandle<u64, DropBox> = RefHandle::construct(&domain).unwrap();
        assert_eq!(first_handle.thread_index(), 0);
        {
            let second_handle: RefHandle<u64, DropBox> = RefHandle::construct(&domain).unwrap();
            assert_eq!(second_handle.thread_index(), 1);
        }
        let second_handle: RefHandle<u64, DropBox> = RefHandle::construct(&domain).unwrap();
        assert_eq!(second_handle.thread_index(), 1);

        assert!(matches!(
            RefHandle::construct(&domain),
            Err(NoThreadIndexAvailableError)
        ));
    }

    #[test]
    fn test_dropping_handle_clears_its_slots() {
        let domain: Domain<u64, _> =
            Domain::new(Config::with_max_threads(2, 2), |_: NonNull<u64>| {}).unwrap();
        let mut a: u64 = 1;
        let a_ptr: NonNull<u64> = NonNull::from(&mut a);

        let mut writer = RefHandle::construct(&domain).unwrap();
        {
            let reader = RefHandle::construct(&domain).unwrap();
            reader.protect_ptr(1, a_ptr.as_ptr());
            unsafe { writer.retire(a_ptr) };
            assert_eq!(writer.retired_len(), 1);
        }
        assert_eq!(writer.collect(), 1);
        assert_eq!(writer.retired_len(), 0);
    }

    #[test]
    fn test_readers_and_writers_with_4_threads() {
        test_readers_and_writers::<4>(2_000);
    }

    struct Counted {
        value: usize,
        drops: Arc<AtomicUsize>,
    }

    impl Drop for Counted {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Half the threads keep replacing the shared object and retiring the old one while the
    /// other half read through it.
    fn test_readers_and_writers<const NUM_THREADS: usize>(iterations: usize) {
        let domain: Domain<Counted> =
            Domain::new(Config::with_max_threads(NUM_THREADS, 1), DropBox).unwrap();
        let drops: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
        let shared: AtomicPtr<Counted> = AtomicPtr::new(Box::into_raw(Box::new(Counted {
            value: 0,
            drops: drops.clone(),
        })));

        thread::scope(|scope| {
            for i in 0..NUM_THREADS {
                let mut handle: RefHandle<Counted, DropBox> =
                    RefHandle::construct(&domain).unwrap();
                let shared: &AtomicPtr<Counted> = &shared;
                let drops: Arc<AtomicUsize> = drops.clone();
                scope.spawn(move || {
                    for n in 0..iterations {
                        if i % 2 == 0 {
                            let replacement: *mut Counted = Box::into_raw(Box::new(Counted {
                                value: n,
                                drops: drops.clone(),
                            }));
                            let old: *mut Counted = shared.swap(replacement, Ordering::AcqRel);
                            unsafe { handle.retire(NonNull::new(old).unwrap()) };
                        } else {
                            let protected: *mut Counted = handle.protect(0, shared);
                            assert!(unsafe { (*protected).value } < iterations);
                            handle.clear_one(0);
                        }
                    }
                });
            }
        });

        let writers: usize = (NUM_THREADS + 1) / 2;
        let last: *mut Counted = shared.load(Ordering::Acquire);
        drop(unsafe { Box::from_raw(last) });
        domain.destroy();
        assert_eq!(drops.load(Ordering::Relaxed), writers * iterations + 1);
    }
}
