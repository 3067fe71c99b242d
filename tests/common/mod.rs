use core::ptr::NonNull;
use hazard_domain::{ArcHandle, Config, Domain};

cfg_if::cfg_if! {
    if #[cfg(loom)] {
        pub(crate) use loom::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
        pub(crate) use loom::sync::Arc;
        pub(crate) use loom::thread;
    } else if #[cfg(feature = "shuttle")] {
        pub(crate) use shuttle::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
        pub(crate) use shuttle::sync::Arc;
        pub(crate) use shuttle::thread;
    } else {
        pub(crate) use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
        pub(crate) use std::sync::Arc;
        pub(crate) use std::thread;
    }
}

/// A reader protects the shared object while a writer swaps it out and retires it. The deleter
/// only records the address, so the reader can check it was not deleted while protected.
pub(crate) fn reader_never_sees_deleted_object() {
    let deleted: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
    let recorder: Arc<AtomicUsize> = deleted.clone();
    let domain: Domain<u64, _> = Domain::new(
        Config::with_max_threads(2, 1),
        move |ptr: NonNull<u64>| recorder.store(ptr.as_ptr() as usize, Ordering::Release),
    )
    .unwrap();
    let domain = Arc::new(domain);

    let first: *mut u64 = Box::into_raw(Box::new(1));
    let second: *mut u64 = Box::into_raw(Box::new(2));
    let shared: Arc<AtomicPtr<u64>> = Arc::new(AtomicPtr::new(first));

    let mut writer = ArcHandle::construct(domain.clone()).unwrap();
    let reader = ArcHandle::construct(domain.clone()).unwrap();

    let reader_shared: Arc<AtomicPtr<u64>> = shared.clone();
    let reader_deleted: Arc<AtomicUsize> = deleted.clone();
    let join_handle = thread::spawn(move || {
        let protected: *mut u64 = reader.protect(0, &reader_shared);
        assert_ne!(reader_deleted.load(Ordering::Acquire), protected as usize);
        reader.clear();
    });

    let old: *mut u64 = shared.swap(second, Ordering::AcqRel);
    unsafe { writer.retire(NonNull::new(old).unwrap()) };
    join_handle.join().expect("the reader panicked");

    writer.collect();
    assert_eq!(deleted.load(Ordering::Acquire), first as usize);
    assert_eq!(writer.retired_len(), 0);

    drop(writer);
    unsafe {
        drop(Box::from_raw(first));
        drop(Box::from_raw(second));
    }
}
