use core::marker::PhantomData;

/// A dense, zero-based index identifying a participating thread within a [Domain].
///
/// [Domain]: crate::Domain
pub type ThreadIndex = usize;

/// The column of a hazard slot within a thread's row of the slot table.
pub type SlotIndex = usize;

/// An object address as stored in a hazard slot. Zero means the slot protects nothing.
pub(crate) type Address = usize;

/// The value of a hazard slot which protects nothing.
pub(crate) const UNPROTECTED: Address = 0;

/// The caller's identity for every domain operation.
///
/// A token is neither `Clone` nor `Sync`: holding `&mut ThreadToken` is what gives a thread
/// exclusive access to its own retire list. Tokens may still be sent to another thread, which
/// then takes over the index.
#[derive(Debug, Eq, PartialEq)]
pub struct ThreadToken {
    index: ThreadIndex,
    _not_sync: PhantomData<core::cell::Cell<()>>,
}

impl ThreadToken {
    /// Create a token for `index`.
    ///
    /// # Safety
    ///
    /// At most one token for a given index may be live per [Domain] at any time, and no handle
    /// registered with that domain may hold the same index. Two live tokens with the same index
    /// would let two threads mutate the same retire list concurrently.
    ///
    /// [Domain]: crate::Domain
    pub unsafe fn new(index: ThreadIndex) -> Self {
        Self {
            index,
            _not_sync: PhantomData,
        }
    }

    #[inline]
    pub fn index(&self) -> ThreadIndex {
        self.index
    }
}
