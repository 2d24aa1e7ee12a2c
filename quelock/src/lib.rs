//! # Quelock
//!
//! **Quelock** is a small library of blocking synchronization primitives for
//! OS threads, built around one queue-based synchronizer engine.
//!
//! Every lock in the crate is a thin policy over a [`Synchronizer`]: an atomic
//! state word plus a FIFO queue of parked threads. The engine handles
//! queueing, parking, cancellation and wake-up; the policy only says what the
//! state word means. It offers:
//!
//! - **Exclusive and shared acquisition** on the same engine
//! - **Interruptible and timed waits** that cancel their queue node cleanly
//! - **Condition variables** that release the lock and reacquire it on signal
//! - **Concrete locks**: [`ExclusiveMutex`], [`TwinsLock`] and [`RwLock`]
//! - A **guarded cache** ([`Cache`]) on top of the reader/writer lock
//!
//! ## Quick Start
//!
//! ```rust
//! use quelock::ExclusiveMutex;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::thread;
//!
//! let mutex = ExclusiveMutex::new();
//! let counter = Arc::new(AtomicUsize::new(0));
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|_| {
//!         let mutex = mutex.clone();
//!         let counter = Arc::clone(&counter);
//!         thread::spawn(move || {
//!             mutex.lock();
//!             counter.fetch_add(1, Ordering::Relaxed);
//!             mutex.unlock().unwrap();
//!         })
//!     })
//!     .collect();
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! assert_eq!(counter.load(Ordering::Relaxed), 4);
//! ```
//!
//! ## Modules
//!
//! - [`sync`]: the synchronizer engine, locks and conditions
//! - [`thread`]: thread identity and interruption
//! - [`cache`]: the guarded cache
//!
//! ## Getting Started
//!
//! Add Quelock to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! quelock = { git = "https://github.com/Nebula-ecosystem/Quelock", package = "quelock" }
//! ```

mod builder;
mod error;
mod park;
mod utils;

pub mod cache;
pub mod sync;
pub mod thread;

pub use builder::SyncBuilder;
pub use cache::Cache;
pub use error::{Error, Result};
pub use sync::{
    Condition, ExclusiveMutex, ExclusivePolicy, Lock, LockGuard, ReadLock, RwLock, SharedPolicy,
    SyncState, Synchronizer, TwinsLock, WriteLock,
};
pub use thread::{ThreadHandle, ThreadToken};
