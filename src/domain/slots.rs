use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::err::Error;
use crate::sync::{AtomicUsize, Ordering};
use crate::types::{Address, SlotIndex, ThreadIndex, UNPROTECTED};

/// The hazard slots of every thread: `max_threads` rows of `max_hps` atomic addresses, stored
/// row-major in one allocation.
///
/// Each row is written only by the thread owning that index and read by every thread scanning
/// its retire list.
#[derive(Debug)]
pub(crate) struct SlotTable {
    max_threads: usize,
    max_hps: usize,
    cells: Box<[AtomicUsize]>,
}

impl SlotTable {
    pub(crate) fn new(max_threads: usize, max_hps: usize) -> Result<Self, Error> {
        let len: usize = max_threads
            .checked_mul(max_hps)
            .ok_or(Error::AllocationFailed {
                what: "hazard slots",
                len: usize::MAX,
            })?;
        let cells: Box<[AtomicUsize]> =
            try_boxed_slice("hazard slots", len, |_| Ok(AtomicUsize::new(UNPROTECTED)))?;
        Ok(Self {
            max_threads,
            max_hps,
            cells,
        })
    }

    pub(crate) fn max_threads(&self) -> usize {
        self.max_threads
    }

    pub(crate) fn max_hps(&self) -> usize {
        self.max_hps
    }

    pub(crate) fn row(&self, thread_index: ThreadIndex) -> Option<&[AtomicUsize]> {
        if thread_index >= self.max_threads {
            return None;
        }
        let start: usize = thread_index * self.max_hps;
        self.cells.get(start..start + self.max_hps)
    }

    pub(crate) fn slot(
        &self,
        thread_index: ThreadIndex,
        slot_index: SlotIndex,
    ) -> Option<&AtomicUsize> {
        self.row(thread_index)?.get(slot_index)
    }

    /// Whether any slot of any thread currently holds `address`.
    pub(crate) fn is_protected(&self, address: Address) -> bool {
        self.cells
            .iter()
            .any(|slot| slot.load(Ordering::SeqCst) == address)
    }
}

/// Build a boxed slice of `len` elements, reporting allocation failure instead of aborting.
pub(crate) fn try_boxed_slice<T, F>(
    what: &'static str,
    len: usize,
    mut init: F,
) -> Result<Box<[T]>, Error>
where
    F: FnMut(usize) -> Result<T, Error>,
{
    let mut elements: Vec<T> = Vec::new();
    elements
        .try_reserve_exact(len)
        .map_err(|_| Error::AllocationFailed { what, len })?;
    for i in 0..len {
        elements.push(init(i)?);
    }
    Ok(elements.into_boxed_slice())
}
