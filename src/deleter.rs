use alloc::boxed::Box;
use core::ptr::NonNull;

/// Destroys objects once a [Domain](crate::Domain) has proven nobody can still reach them.
///
/// The deleter may run on whichever thread's `retire` call found the object reclaimable, so it
/// must be `Send + Sync` to be shared by a domain used from several threads.
pub trait Deleter<T> {
    /// # Safety
    ///
    /// `ptr` was retired to the owning domain, is unreachable by every thread, and is passed
    /// here exactly once.
    unsafe fn delete(&self, ptr: NonNull<T>);
}

impl<T, F> Deleter<T> for F
where
    F: Fn(NonNull<T>),
{
    unsafe fn delete(&self, ptr: NonNull<T>) {
        self(ptr)
    }
}

/// Frees objects which were allocated with [Box::new] and leaked with [Box::into_raw].
#[derive(Clone, Copy, Debug, Default)]
pub struct DropBox;

impl<T> Deleter<T> for DropBox {
    unsafe fn delete(&self, ptr: NonNull<T>) {
        // SAFETY: the domain only hands over retired pointers once, and retire requires them to
        // come from Box::into_raw when this deleter is used.
        drop(unsafe { Box::from_raw(ptr.as_ptr()) });
    }
}
