//! Blocking synchronization primitives.
//!
//! Every lock in this module is a thin policy over one queue-based
//! [`Synchronizer`]. The synchronizer owns the state word and the wait
//! queue; the policy decides what the state word means.
//!
//! The current primitives include:
//! - [`ExclusiveMutex`]: a single-owner lock with conditions.
//! - [`TwinsLock`]: a shared lock with two permits by default.
//! - [`RwLock`]: a reader/writer lock exposed as [`ReadLock`] and [`WriteLock`].
//! - [`Condition`]: a condition variable bound to an exclusive lock.
//!
//! ## Design notes
//!
//! - Blocked threads are parked on the OS; nothing spawns threads.
//! - A thread arriving while a lock is free may take it ahead of queued
//!   threads. Queued threads are served in FIFO order.
//! - Locks are handles over an `Arc`: clone them to share between threads.
//! - Misuse (unlocking a lock you do not hold, waiting on a condition
//!   without its lock) is reported as [`Error::IllegalState`](crate::Error::IllegalState).
//!
//! Custom locks implement [`ExclusivePolicy`] and/or [`SharedPolicy`] and
//! build a [`Synchronizer`] over them.

pub(crate) mod core;

mod condition;
mod lock;
mod mutex;
mod rwlock;
mod twins;

pub use self::core::{ExclusivePolicy, SharedPolicy, SyncState, Synchronizer};
pub use condition::Condition;
pub use lock::{Lock, LockGuard};
pub use mutex::{ExclusiveMutex, MutexPolicy};
pub use rwlock::{ReadLock, RwLock, RwPolicy, WriteLock};
pub use twins::{TwinsLock, TwinsPolicy};
