use crate::types::{SlotIndex, ThreadIndex};
use displaydoc::Display;

/// Any error which can occur while building a [Domain](crate::Domain).
#[derive(Debug, Display, Eq, PartialEq)]
pub enum Error {
    /// The domain configuration was rejected: {0}
    Config(ConfigError),
    /// Could not allocate {len} entries for the {what}.
    AllocationFailed { what: &'static str, len: usize },
}

impl From<ConfigError> for Error {
    fn from(config_error: ConfigError) -> Self {
        Error::Config(config_error)
    }
}

/// A configuration value which cannot produce a working domain.
#[derive(Debug, Display, Eq, PartialEq)]
pub enum ConfigError {
    /// The maximum number of threads must be at least 1.
    ZeroThreads,

    /** The process-wide thread ceiling was already fixed at {current}, either by an earlier call
        to `configure` or because a domain configuration already read the default.
    */
    AlreadyConfigured { current: usize },

    /// {max_threads} threads with {max_hps} hazard slots each overflows the retire list capacity.
    RetireCapacityOverflow { max_threads: usize, max_hps: usize },

    /// The reclamation threshold {threshold} exceeds the retire list capacity {max_retired}.
    ThresholdExceedsCapacity { threshold: usize, max_retired: usize },
}

/// All thread indices of this domain are already claimed by a handle.
#[derive(Debug, Display, Eq, PartialEq)]
pub struct NoThreadIndexAvailableError;

/// A broken internal invariant. These are never returned; they become the panic message.
#[derive(Debug, Display, Eq, PartialEq)]
pub(crate) enum FatalError {
    /** Hazard slot ({thread_index}, {slot_index}) is outside the slot table of {max_threads}
        threads by {max_hps} slots.
    */
    SlotOutOfBounds {
        thread_index: ThreadIndex,
        slot_index: SlotIndex,
        max_threads: usize,
        max_hps: usize,
    },

    /// Thread {thread_index} passed the index check but has no retire list.
    RetireListMissing { thread_index: ThreadIndex },

    /// Thread {thread_index} would have more than {max_retired} retired objects outstanding.
    RetireListOverflow {
        thread_index: ThreadIndex,
        max_retired: usize,
    },
}

/// Log `error` and halt. Continuing would risk a use-after-free or a leak of unknown size.
#[cold]
#[inline(never)]
pub(crate) fn fatal(error: FatalError) -> ! {
    tracing::error!(%error, "hazard domain invariant violated");
    panic!("{}", error)
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

#[cfg(feature = "std")]
impl std::error::Error for NoThreadIndexAvailableError {}
