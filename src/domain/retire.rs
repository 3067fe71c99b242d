use alloc::vec::Vec;
use core::ptr::NonNull;

use crate::deleter::Deleter;
use crate::domain::slots::SlotTable;
use crate::err::Error;

/// Objects a single thread has retired but not yet handed to the deleter, oldest first.
///
/// Only the thread owning the list touches it, so it needs no synchronization of its own.
#[derive(Debug)]
pub(crate) struct RetireList<T> {
    retired: Vec<NonNull<T>>,
}

/// What one scan pass did to a retire list.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct ScanSummary {
    pub(crate) examined: usize,
    pub(crate) reclaimed: usize,
}

impl<T> RetireList<T> {
    /// Reserve room for `capacity` entries up front so retiring never allocates.
    pub(crate) fn with_capacity(capacity: usize) -> Result<Self, Error> {
        let mut retired: Vec<NonNull<T>> = Vec::new();
        retired.try_reserve_exact(capacity).map_err(|_| Error::AllocationFailed {
            what: "retire list",
            len: capacity,
        })?;
        Ok(Self { retired })
    }

    pub(crate) fn len(&self) -> usize {
        self.retired.len()
    }

    pub(crate) fn push(&mut self, ptr: NonNull<T>) {
        self.retired.push(ptr);
    }

    /// Hand every entry no hazard slot protects to `deleter`, keeping the rest in order.
    ///
    /// # Safety
    ///
    /// Every entry must be unreachable from shared memory, so that a slot which does not hold
    /// its address now can never come to hold it again.
    pub(crate) unsafe fn scan<D: Deleter<T>>(
        &mut self,
        slots: &SlotTable,
        deleter: &D,
    ) -> ScanSummary {
        let examined: usize = self.retired.len();
        self.retired.retain(|ptr| {
            if slots.is_protected(ptr.as_ptr() as usize) {
                return true;
            }
            // SAFETY: unreachable per the caller, and unprotected per the scan just made.
            unsafe { deleter.delete(*ptr) };
            false
        });
        ScanSummary {
            examined,
            reclaimed: examined - self.retired.len(),
        }
    }

    /// Hand every entry to `deleter` whether or not it is protected.
    ///
    /// # Safety
    ///
    /// No thread may still be reading any of the entries.
    pub(crate) unsafe fn drain<D: Deleter<T>>(&mut self, deleter: &D) -> usize {
        let drained: usize = self.retired.len();
        for ptr in self.retired.drain(..) {
            // SAFETY: no readers remain per the caller.
            unsafe { deleter.delete(ptr) };
        }
        drained
    }
}
