//! Sizing of hazard domains.
//!
//! Every [Domain](crate::Domain) is built from an explicit [Config]. A process-wide thread ceiling
//! is kept for callers that prefer not to thread one through: it is fixed by [configure] or, if
//! nobody configured it, by the first read through [max_threads]. Configure before building the
//! first config which relies on it.

use crate::err::ConfigError;

// The process-wide ceiling is not part of the reclamation protocol, so it stays on core atomics
// even under loom and shuttle.
use core::sync::atomic::{AtomicUsize, Ordering};

/// The thread ceiling used when [configure] was never called.
pub const DEFAULT_MAX_THREADS: usize = 128;

/// The number of hazard slots per thread used when a config asks for zero.
pub const DEFAULT_MAX_HPS: usize = 4;

/// Retire on every call, scanning each time.
pub const DEFAULT_RECLAIM_THRESHOLD: usize = 0;

const UNSET: usize = 0;

static MAX_THREADS: AtomicUsize = AtomicUsize::new(UNSET);

/// Fix the process-wide thread ceiling used by [Config::new].
///
/// Succeeds at most once per process, and only if no config has read the default yet.
pub fn configure(max_threads: usize) -> Result<(), ConfigError> {
    if max_threads == 0 {
        return Err(ConfigError::ZeroThreads);
    }
    MAX_THREADS
        .compare_exchange(UNSET, max_threads, Ordering::AcqRel, Ordering::Acquire)
        .map(|_| ())
        .map_err(|current| ConfigError::AlreadyConfigured { current })
}

/// The process-wide thread ceiling. The first call without a prior [configure] seals the default.
pub fn max_threads() -> usize {
    match MAX_THREADS.compare_exchange(
        UNSET,
        DEFAULT_MAX_THREADS,
        Ordering::AcqRel,
        Ordering::Acquire,
    ) {
        Ok(_) => DEFAULT_MAX_THREADS,
        Err(current) => current,
    }
}

/// The shape of one hazard domain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    max_threads: usize,
    max_hps: usize,
    reclaim_threshold: usize,
}

impl Config {
    /// A config for `max_hps` slots per thread and the process-wide thread ceiling.
    pub fn new(max_hps: usize) -> Self {
        Self::with_max_threads(max_threads(), max_hps)
    }

    /// A config for an explicit thread count. `max_hps == 0` selects [DEFAULT_MAX_HPS].
    pub fn with_max_threads(max_threads: usize, max_hps: usize) -> Self {
        let max_hps = if max_hps == 0 { DEFAULT_MAX_HPS } else { max_hps };
        Self {
            max_threads,
            max_hps,
            reclaim_threshold: DEFAULT_RECLAIM_THRESHOLD,
        }
    }

    /// Only scan once a thread's retire list holds at least `threshold` entries.
    ///
    /// Objects sitting below the threshold are not reclaimed until the list grows or
    /// [Domain::collect](crate::Domain::collect) runs.
    pub fn reclaim_threshold(mut self, threshold: usize) -> Self {
        self.reclaim_threshold = threshold;
        self
    }

    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    pub fn max_hps(&self) -> usize {
        self.max_hps
    }

    pub fn threshold(&self) -> usize {
        self.reclaim_threshold
    }

    /// The number of retired objects a thread may have outstanding: one per hazard slot in the
    /// whole table. Saturates; [Config::validate] rejects the overflowing case.
    pub fn max_retired(&self) -> usize {
        self.max_threads.saturating_mul(self.max_hps)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        let max_retired: usize = self
            .max_threads
            .checked_mul(self.max_hps)
            .ok_or(ConfigError::RetireCapacityOverflow {
                max_threads: self.max_threads,
                max_hps: self.max_hps,
            })?;
        if self.reclaim_threshold > max_retired {
            return Err(ConfigError::ThresholdExceedsCapacity {
                threshold: self.reclaim_threshold,
                max_retired,
            });
        }
        Ok(())
    }
}
