//! Hazard-pointer domains for safe memory reclamation in lock-free data structures.
//!
//! A [Domain] lets readers dereference shared objects through raw pointers without locks while
//! writers unlink and free those objects concurrently. A reader publishes the address it is about
//! to use in one of its hazard slots; a writer hands an unlinked object to [Domain::retire], and
//! the object is passed to the domain's [Deleter] only once no hazard slot of any thread holds its
//! address.
//!
//! Every operation takes the caller's [ThreadToken], a dense index below the domain's
//! [max_threads](Config::max_threads). Tokens either come from an external thread-identity
//! source through [ThreadToken::new], or from registering with the domain through [RefHandle] and
//! [ArcHandle].
//!
//! ```
//! use core::ptr::NonNull;
//! use hazard_domain::{Config, Domain, DropBox, RefHandle};
//! use std::sync::atomic::{AtomicPtr, Ordering};
//!
//! let domain: Domain<u64> = Domain::new(Config::with_max_threads(4, 2), DropBox).unwrap();
//! let shared: AtomicPtr<u64> = AtomicPtr::new(Box::into_raw(Box::new(1)));
//!
//! let reader = RefHandle::construct(&domain).unwrap();
//! let mut writer = RefHandle::construct(&domain).unwrap();
//!
//! let protected: *mut u64 = reader.protect(0, &shared);
//!
//! // unlink and retire while the reader still holds the old value
//! let old: *mut u64 = shared.swap(Box::into_raw(Box::new(2)), Ordering::AcqRel);
//! unsafe { writer.retire(NonNull::new(old).unwrap()) };
//! assert_eq!(unsafe { *protected }, 1);
//! assert_eq!(writer.retired_len(), 1);
//!
//! reader.clear();
//! assert_eq!(writer.collect(), 1);
//!
//! drop(unsafe { Box::from_raw(shared.load(Ordering::Acquire)) });
//! ```
//!
//! # Memory ordering
//!
//! [Domain::protect] stores the address, issues a `SeqCst` fence, and re-reads the source
//! location. The retiring thread issues a `SeqCst` fence before reading the hazard slots. Either
//! the scan observes the published slot, or the reader observes the unlink and retries.
//! [Domain::clear] and [Domain::clear_one] use release stores so a scan which reads zero also sees
//! every access the reader made through the pointer.
//!
//! # Failure handling
//!
//! No runtime operation returns an error. A retirement from a token outside the domain is logged
//! with `tracing` and dropped. A broken invariant, such as a hazard slot index outside the table
//! or a retire list past its capacity, panics after logging; build with `panic = "abort"` to turn
//! these into aborts.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod config;
mod deleter;
mod domain;
pub mod err;
mod sync;
mod types;
mod wrapper;

pub use config::{configure, Config};
pub use deleter::{Deleter, DropBox};
pub use domain::Domain;
pub use err::{ConfigError, Error, NoThreadIndexAvailableError};
pub use types::{SlotIndex, ThreadIndex, ThreadToken};
pub use wrapper::{ArcHandle, RefHandle};
