use alloc::boxed::Box;
use core::cell::UnsafeCell;
use core::fmt;
use core::ptr::NonNull;

use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::deleter::{Deleter, DropBox};
use crate::domain::retire::{RetireList, ScanSummary};
use crate::domain::slots::{try_boxed_slice, SlotTable};
use crate::err::{fatal, Error, FatalError};
use crate::sync::{fence, AtomicBool, AtomicPtr, AtomicUsize, Ordering};
use crate::types::{Address, SlotIndex, ThreadIndex, ThreadToken, UNPROTECTED};

pub(crate) mod retire;
pub(crate) mod slots;

/// One hazard-pointer facility: a slot table shared by all threads, one retire list per thread,
/// and the deleter for the objects retired into it.
///
/// Readers publish an address with one of the `protect` methods before dereferencing it and
/// clear the slot when done. Writers unlink an object from their data structure and [retire]
/// it; the retiring thread then scans the slot table and deletes every object it retired which
/// no slot holds.
///
/// Each published slot must be cleared in finite time, or the object it names is never
/// reclaimed.
///
/// Readers on different threads share the protected objects, so a domain is only [Sync] when
/// `T` is:
///
/// ```compile_fail
/// use core::cell::Cell;
/// use hazard_domain::Domain;
///
/// fn shared<S: Sync>() {}
/// shared::<Domain<Cell<u64>>>();
/// ```
///
/// [retire]: Domain::retire
pub struct Domain<T, D: Deleter<T> = DropBox> {
    config: Config,
    slots: SlotTable,
    retire_lists: Box<[UnsafeCell<RetireList<T>>]>,
    /// Whether a handle currently owns each [ThreadIndex].
    pub(crate) thread_index_slots: Box<[AtomicBool]>,
    deleter: D,
}

// SAFETY: retired objects may be deleted on any thread, hence `T: Send`. The deleter is shared
// by every thread that retires. Each retire list is only reached through the `&mut ThreadToken`
// of its index. Sharing the domain shares protected objects between readers, hence `T: Sync`.
unsafe impl<T: Send, D: Deleter<T> + Send + Sync> Send for Domain<T, D> {}
unsafe impl<T: Send + Sync, D: Deleter<T> + Send + Sync> Sync for Domain<T, D> {}

impl<T, D: Deleter<T>> Domain<T, D> {
    /// Allocate the slot table and retire lists described by `config`.
    pub fn new(config: Config, deleter: D) -> Result<Self, Error> {
        config.validate()?;
        let max_threads: usize = config.max_threads();
        let slots: SlotTable = SlotTable::new(max_threads, config.max_hps())?;
        let max_retired: usize = config.max_retired();
        let retire_lists: Box<[UnsafeCell<RetireList<T>>]> =
            try_boxed_slice("retire lists", max_threads, |_| {
                RetireList::with_capacity(max_retired).map(UnsafeCell::new)
            })?;
        let thread_index_slots: Box<[AtomicBool]> =
            try_boxed_slice("thread registrations", max_threads, |_| Ok(AtomicBool::new(false)))?;

        debug!(
            max_threads,
            max_hps = config.max_hps(),
            max_retired,
            reclaim_threshold = config.threshold(),
            "created hazard domain"
        );
        Ok(Self {
            config,
            slots,
            retire_lists,
            thread_index_slots,
            deleter,
        })
    }

    /// Delete every object still waiting in any retire list and release the domain.
    ///
    /// Taking `self` by value guarantees no thread holds a reference to the domain. Raw pointers
    /// obtained from `protect` must not be used afterwards.
    pub fn destroy(self) {
        drop(self)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Publish the current value of `location` in slot `slot_index` of the caller and return it
    /// once it is known to be protected.
    ///
    /// The value is loaded, published, and loaded again until two loads agree; only then can no
    /// concurrent scan have missed the publication while the object was still reachable. The
    /// loop is lock-free but not wait-free: a writer which keeps changing `location` can keep a
    /// reader spinning.
    ///
    /// # Panics
    ///
    /// If the token or `slot_index` lies outside the slot table.
    pub fn protect(
        &self,
        token: &ThreadToken,
        slot_index: SlotIndex,
        location: &AtomicPtr<T>,
    ) -> *mut T {
        let slot: &AtomicUsize = self.slot(token, slot_index);
        let mut ptr: *mut T = location.load(Ordering::Acquire);
        loop {
            slot.store(ptr as Address, Ordering::SeqCst);
            // pairs with the fence in `scan`: either the scan sees this slot or we see the unlink
            fence(Ordering::SeqCst);
            let current: *mut T = location.load(Ordering::Acquire);
            if current == ptr {
                return ptr;
            }
            ptr = current;
        }
    }

    /// Publish `ptr`, which the caller already knows cannot be retired concurrently, for example
    /// because another of its own slots protects an object pointing to it.
    pub fn protect_ptr(&self, token: &ThreadToken, slot_index: SlotIndex, ptr: *mut T) -> *mut T {
        self.slot(token, slot_index)
            .store(ptr as Address, Ordering::SeqCst);
        ptr
    }

    /// [protect_ptr](Domain::protect_ptr) with a release store, for call sites where the
    /// publication itself is the synchronization point.
    pub fn protect_release(
        &self,
        token: &ThreadToken,
        slot_index: SlotIndex,
        ptr: *mut T,
    ) -> *mut T {
        self.slot(token, slot_index)
            .store(ptr as Address, Ordering::Release);
        ptr
    }

    /// Reset every slot of the caller.
    pub fn clear(&self, token: &ThreadToken) {
        for slot in self.row(token) {
            slot.store(UNPROTECTED, Ordering::Release);
        }
    }

    /// Reset slot `slot_index` of the caller. No other slot changes.
    pub fn clear_one(&self, token: &ThreadToken, slot_index: SlotIndex) {
        self.slot(token, slot_index)
            .store(UNPROTECTED, Ordering::Release);
    }

    /// Hand `ptr` to the domain for deletion once no slot protects it, then scan the caller's
    /// retire list if it has reached the reclamation threshold.
    ///
    /// A token outside the domain is logged and the retirement is dropped: `ptr` is then neither
    /// retired nor deleted.
    ///
    /// # Safety
    ///
    /// * `ptr` must already be unreachable from shared memory, so no thread can newly protect it.
    /// * `ptr` must not be retired again, and must be valid to pass to the domain's deleter.
    ///
    /// # Panics
    ///
    /// If the caller's retire list is full and a scan frees nothing, which means every hazard
    /// slot of the domain protects one of its [max_retired](Config::max_retired) entries.
    #[instrument(level = "trace", skip_all, fields(thread_index = token.index()))]
    pub unsafe fn retire(&self, token: &mut ThreadToken, ptr: NonNull<T>) {
        let thread_index: ThreadIndex = token.index();
        if !self.contains(thread_index) {
            warn!(
                thread_index,
                max_threads = self.config.max_threads(),
                "dropping retirement from a thread outside the domain"
            );
            return;
        }
        let max_retired: usize = self.config.max_retired();
        let retire_list: &mut RetireList<T> = self.retire_list_mut(token);
        if retire_list.len() >= max_retired {
            // SAFETY: every entry was retired under this function's contract.
            unsafe { self.scan(thread_index, retire_list) };
            if retire_list.len() >= max_retired {
                fatal(FatalError::RetireListOverflow {
                    thread_index,
                    max_retired,
                });
            }
        }
        retire_list.push(ptr);
        if retire_list.len() < self.config.threshold() {
            return;
        }
        // SAFETY: every entry was retired under this function's contract.
        unsafe { self.scan(thread_index, retire_list) };
    }

    /// Scan the caller's retire list now, regardless of the reclamation threshold, and return how
    /// many objects were deleted.
    #[instrument(level = "trace", skip_all, fields(thread_index = token.index()))]
    pub fn collect(&self, token: &mut ThreadToken) -> usize {
        let thread_index: ThreadIndex = token.index();
        if !self.contains(thread_index) {
            warn!(thread_index, "ignoring collect from a thread outside the domain");
            return 0;
        }
        let retire_list: &mut RetireList<T> = self.retire_list_mut(token);
        // SAFETY: entries only enter the list through `retire`, whose contract makes them
        // unreachable.
        unsafe { self.scan(thread_index, retire_list) }.reclaimed
    }

    /// The number of objects the caller retired which are still waiting for deletion.
    pub fn retired_len(&self, token: &ThreadToken) -> usize {
        if !self.contains(token.index()) {
            return 0;
        }
        let cell: &UnsafeCell<RetireList<T>> = self.retire_list(token.index());
        // SAFETY: the only mutable access goes through the `&mut` of this same token.
        unsafe { &*cell.get() }.len()
    }

    /// # Safety
    ///
    /// Every entry of `retire_list` must be unreachable from shared memory.
    unsafe fn scan(
        &self,
        thread_index: ThreadIndex,
        retire_list: &mut RetireList<T>,
    ) -> ScanSummary {
        // pairs with the fence in `protect`
        fence(Ordering::SeqCst);
        let summary: ScanSummary = unsafe { retire_list.scan(&self.slots, &self.deleter) };
        debug!(
            thread_index,
            examined = summary.examined,
            reclaimed = summary.reclaimed,
            remaining = summary.examined - summary.reclaimed,
            "scanned retire list"
        );
        summary
    }

    fn contains(&self, thread_index: ThreadIndex) -> bool {
        thread_index < self.config.max_threads()
    }

    fn retire_list(&self, thread_index: ThreadIndex) -> &UnsafeCell<RetireList<T>> {
        self.retire_lists
            .get(thread_index)
            .unwrap_or_else(|| fatal(FatalError::RetireListMissing { thread_index }))
    }

    #[allow(clippy::mut_from_ref)]
    fn retire_list_mut<'a>(&'a self, token: &'a mut ThreadToken) -> &'a mut RetireList<T> {
        let cell: &UnsafeCell<RetireList<T>> = self.retire_list(token.index());
        // SAFETY: `token` is the only live token for its index and it is borrowed mutably for as
        // long as the returned list.
        unsafe { &mut *cell.get() }
    }

    fn row(&self, token: &ThreadToken) -> &[AtomicUsize] {
        let thread_index: ThreadIndex = token.index();
        self.slots.row(thread_index).unwrap_or_else(|| {
            fatal(FatalError::SlotOutOfBounds {
                thread_index,
                slot_index: 0,
                max_threads: self.slots.max_threads(),
                max_hps: self.slots.max_hps(),
            })
        })
    }

    fn slot(&self, token: &ThreadToken, slot_index: SlotIndex) -> &AtomicUsize {
        let thread_index: ThreadIndex = token.index();
        self.slots.slot(thread_index, slot_index).unwrap_or_else(|| {
            fatal(FatalError::SlotOutOfBounds {
                thread_index,
                slot_index,
                max_threads: self.slots.max_threads(),
                max_hps: self.slots.max_hps(),
            })
        })
    }
}

impl<T, D: Deleter<T>> Drop for Domain<T, D> {
    fn drop(&mut self) {
        let mut deleted: usize = 0;
        for retire_list in self.retire_lists.iter_mut() {
            // SAFETY: `&mut self` means no thread can still be protecting or retiring.
            deleted += unsafe { retire_list.get_mut().drain(&self.deleter) };
        }
        debug!(deleted, "destroyed hazard domain");
    }
}

impl<T, D: Deleter<T>> fmt::Debug for Domain<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Domain")
            .field("config", &self.config)
            .field("slots", &self.slots)
            .finish_non_exhaustive()
    }
}
