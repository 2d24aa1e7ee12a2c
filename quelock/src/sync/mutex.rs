use super::condition::Condition;
use super::core::{ExclusivePolicy, Synchronizer};
use super::lock::Lock;
use crate::builder::SyncBuilder;
use crate::error::{Error, Result};
use crate::thread;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const UNLOCKED: i64 = 0;
const LOCKED: i64 = 1;

/// State policy of [`ExclusiveMutex`]: `0` is free, `1` is held.
#[derive(Debug, Default)]
pub struct MutexPolicy;

impl ExclusivePolicy for MutexPolicy {
    fn try_acquire(&self, sync: &Synchronizer<Self>, _arg: i64) -> bool {
        let state = sync.state();

        if state.compare_and_set(UNLOCKED, LOCKED) {
            state.set_owner(Some(thread::token()));
            return true;
        }

        false
    }

    fn try_release(&self, sync: &Synchronizer<Self>, _arg: i64) -> Result<bool> {
        let state = sync.state();

        if state.get() == UNLOCKED || !state.is_owned_by_current_thread() {
            debug!(thread = %thread::token(), "unlock of a mutex not held by this thread");
            return Err(Error::IllegalState("mutex is not held by the current thread"));
        }

        state.set_owner(None);
        state.set(UNLOCKED);
        Ok(true)
    }

    fn is_held_exclusively(&self, sync: &Synchronizer<Self>) -> bool {
        let state = sync.state();
        state.get() == LOCKED && state.is_owned_by_current_thread()
    }
}

/// A non-reentrant mutual exclusion lock for OS threads.
///
/// Unlike `std::sync::Mutex`, the lock is not tied to a guard or to the data
/// it protects: any code path on the owning thread may call
/// [`unlock`](Self::unlock), and an unlock from any other thread fails with
/// [`Error::IllegalState`]. Waiting threads queue in FIFO order; a thread
/// arriving while the lock is free may still take it first.
///
/// Cloning yields another handle to the same lock.
///
/// # Examples
///
/// ```rust
/// use quelock::ExclusiveMutex;
///
/// let mutex = ExclusiveMutex::new();
/// mutex.lock();
/// assert!(mutex.is_held_by_current_thread());
/// mutex.unlock().unwrap();
/// assert!(mutex.unlock().is_err());
/// ```
#[derive(Clone)]
pub struct ExclusiveMutex {
    sync: Arc<Synchronizer<MutexPolicy>>,
}

impl ExclusiveMutex {
    /// Creates an unlocked mutex.
    pub fn new() -> Self {
        Self::with_builder(SyncBuilder::new())
    }

    /// Creates an unlocked mutex with a configured wait queue.
    pub fn with_builder(builder: SyncBuilder) -> Self {
        Self {
            sync: Arc::new(builder.build(MutexPolicy, UNLOCKED)),
        }
    }

    /// Acquires the mutex, blocking until it is available.
    pub fn lock(&self) {
        self.sync.acquire(LOCKED);
    }

    /// Acquires the mutex only if it is free right now.
    pub fn try_lock(&self) -> bool {
        self.sync.try_acquire(LOCKED)
    }

    /// Acquires the mutex, waiting at most `timeout`.
    ///
    /// Returns `Ok(false)` if the time ran out, or [`Error::Interrupted`] if
    /// the thread was interrupted first.
    pub fn try_lock_for(&self, timeout: Duration) -> Result<bool> {
        self.sync.try_acquire_for(LOCKED, timeout)
    }

    /// Acquires the mutex unless the calling thread is interrupted.
    pub fn lock_interruptibly(&self) -> Result<()> {
        self.sync.acquire_interruptibly(LOCKED)
    }

    /// Releases the mutex.
    ///
    /// Fails with [`Error::IllegalState`] if the calling thread does not hold it.
    pub fn unlock(&self) -> Result<()> {
        self.sync.release(LOCKED).map(|_| ())
    }

    /// Creates a condition bound to this mutex.
    pub fn new_condition(&self) -> Condition<MutexPolicy> {
        Condition::new(Arc::clone(&self.sync))
    }

    /// Returns `true` if any thread holds the mutex.
    pub fn is_locked(&self) -> bool {
        self.sync.state().get() != UNLOCKED
    }

    /// Returns `true` if the calling thread holds the mutex.
    pub fn is_held_by_current_thread(&self) -> bool {
        self.sync.is_held_exclusively()
    }

    /// Returns `true` if any thread may be waiting to acquire the mutex.
    pub fn has_queued_threads(&self) -> bool {
        self.sync.has_queued_threads()
    }

    /// Estimated number of threads waiting to acquire the mutex.
    pub fn queue_length(&self) -> usize {
        self.sync.queue_length()
    }

    /// Returns `true` if any thread waits on `condition`.
    ///
    /// Fails with [`Error::InvalidArgument`] if `condition` belongs to
    /// another mutex, and with [`Error::IllegalState`] if the mutex is not held.
    pub fn has_waiters(&self, condition: &Condition<MutexPolicy>) -> Result<bool> {
        if !condition.is_bound_to(&self.sync) {
            return Err(Error::InvalidArgument("condition belongs to another lock"));
        }

        condition.has_waiters()
    }

    /// Number of threads waiting on `condition`.
    pub fn wait_queue_length(&self, condition: &Condition<MutexPolicy>) -> Result<usize> {
        if !condition.is_bound_to(&self.sync) {
            return Err(Error::InvalidArgument("condition belongs to another lock"));
        }

        condition.wait_queue_length()
    }
}

impl Default for ExclusiveMutex {
    fn default() -> Self {
        Self::new()
    }
}

impl Lock for ExclusiveMutex {
    fn lock(&self) {
        ExclusiveMutex::lock(self);
    }

    fn try_lock(&self) -> bool {
        ExclusiveMutex::try_lock(self)
    }

    fn try_lock_for(&self, timeout: Duration) -> Result<bool> {
        ExclusiveMutex::try_lock_for(self, timeout)
    }

    fn lock_interruptibly(&self) -> Result<()> {
        ExclusiveMutex::lock_interruptibly(self)
    }

    fn unlock(&self) -> Result<()> {
        ExclusiveMutex::unlock(self)
    }
}

impl fmt::Debug for ExclusiveMutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusiveMutex")
            .field("locked", &self.is_locked())
            .field("owner", &self.sync.state().owner())
            .finish()
    }
}
