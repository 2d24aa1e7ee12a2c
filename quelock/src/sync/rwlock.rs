use super::condition::Condition;
use super::core::{ExclusivePolicy, SharedPolicy, Synchronizer};
use super::lock::Lock;
use crate::builder::SyncBuilder;
use crate::error::{Error, Result};
use crate::thread;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const FREE: i64 = 0;
const WRITER: i64 = -1;

/// State policy of [`RwLock`]: `-1` is a writer, `n >= 0` is `n` readers.
#[derive(Debug, Default)]
pub struct RwPolicy;

impl ExclusivePolicy for RwPolicy {
    fn try_acquire(&self, sync: &Synchronizer<Self>, _arg: i64) -> bool {
        let state = sync.state();

        if state.compare_and_set(FREE, WRITER) {
            state.set_owner(Some(thread::token()));
            return true;
        }

        false
    }

    fn try_release(&self, sync: &Synchronizer<Self>, _arg: i64) -> Result<bool> {
        let state = sync.state();

        if state.get() != WRITER || !state.is_owned_by_current_thread() {
            debug!(thread = %thread::token(), "write unlock without holding the write lock");
            return Err(Error::IllegalState("write lock is not held by the current thread"));
        }

        state.set_owner(None);
        state.set(FREE);
        Ok(true)
    }

    fn is_held_exclusively(&self, sync: &Synchronizer<Self>) -> bool {
        let state = sync.state();
        state.get() == WRITER && state.is_owned_by_current_thread()
    }
}

impl SharedPolicy for RwPolicy {
    fn try_acquire_shared(&self, sync: &Synchronizer<Self>, _arg: i64) -> i64 {
        let state = sync.state();

        loop {
            let readers = state.get();

            // Readers step aside for a writer waiting at the front.
            if readers == WRITER || sync.first_queued_is_exclusive() {
                return -1;
            }

            if state.compare_and_set(readers, readers + 1) {
                return 1;
            }
        }
    }

    fn try_release_shared(&self, sync: &Synchronizer<Self>, _arg: i64) -> Result<bool> {
        let state = sync.state();

        loop {
            let readers = state.get();

            if readers <= FREE {
                debug!(thread = %thread::token(), "read unlock without a held read lock");
                return Err(Error::IllegalState("read lock is not held"));
            }

            if state.compare_and_set(readers, readers - 1) {
                return Ok(readers == 1);
            }
        }
    }
}

/// A reader/writer lock on a single synchronizer.
///
/// Any number of readers may hold the lock together; a writer holds it
/// alone. New readers wait when a writer is first in line, so a steady flow
/// of readers cannot starve writers. The lock is not reentrant and a writer
/// cannot downgrade.
///
/// # Examples
///
/// ```rust
/// use quelock::{Lock, RwLock};
///
/// let lock = RwLock::new();
/// let read = lock.read_lock();
/// read.lock();
/// read.lock();
/// assert_eq!(lock.read_lock_count(), 2);
/// assert!(!lock.write_lock().try_lock());
/// read.unlock().unwrap();
/// read.unlock().unwrap();
/// assert!(lock.write_lock().try_lock());
/// ```
#[derive(Clone)]
pub struct RwLock {
    sync: Arc<Synchronizer<RwPolicy>>,
}

impl RwLock {
    /// Creates an unlocked reader/writer lock.
    pub fn new() -> Self {
        Self::with_builder(SyncBuilder::new())
    }

    /// Creates an unlocked reader/writer lock with a configured wait queue.
    pub fn with_builder(builder: SyncBuilder) -> Self {
        Self {
            sync: Arc::new(builder.build(RwPolicy, FREE)),
        }
    }

    /// The shared half of the lock.
    pub fn read_lock(&self) -> ReadLock {
        ReadLock {
            sync: Arc::clone(&self.sync),
        }
    }

    /// The exclusive half of the lock.
    pub fn write_lock(&self) -> WriteLock {
        WriteLock {
            sync: Arc::clone(&self.sync),
        }
    }

    /// Returns `true` if a writer holds the lock.
    pub fn is_write_locked(&self) -> bool {
        self.sync.state().get() == WRITER
    }

    /// Returns `true` if the calling thread holds the write lock.
    pub fn is_write_locked_by_current_thread(&self) -> bool {
        self.sync.is_held_exclusively()
    }

    /// Number of read locks currently held.
    pub fn read_lock_count(&self) -> usize {
        usize::try_from(self.sync.state().get()).unwrap_or(0)
    }

    /// Returns `true` if any thread may be waiting for either half.
    pub fn has_queued_threads(&self) -> bool {
        self.sync.has_queued_threads()
    }

    /// Estimated number of threads waiting for either half.
    pub fn queue_length(&self) -> usize {
        self.sync.queue_length()
    }
}

impl Default for RwLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RwLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RwLock")
            .field("write_locked", &self.is_write_locked())
            .field("readers", &self.read_lock_count())
            .finish()
    }
}

/// Read view of an [`RwLock`].
#[derive(Clone)]
pub struct ReadLock {
    sync: Arc<Synchronizer<RwPolicy>>,
}

impl Lock for ReadLock {
    fn lock(&self) {
        self.sync.acquire_shared(1);
    }

    fn try_lock(&self) -> bool {
        self.sync.try_acquire_shared(1) >= 0
    }

    fn try_lock_for(&self, timeout: Duration) -> Result<bool> {
        self.sync.try_acquire_shared_for(1, timeout)
    }

    fn lock_interruptibly(&self) -> Result<()> {
        self.sync.acquire_shared_interruptibly(1)
    }

    fn unlock(&self) -> Result<()> {
        self.sync.release_shared(1).map(|_| ())
    }
}

impl fmt::Debug for ReadLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadLock")
            .field("state", self.sync.state())
            .finish()
    }
}

/// Write view of an [`RwLock`].
#[derive(Clone)]
pub struct WriteLock {
    sync: Arc<Synchronizer<RwPolicy>>,
}

impl WriteLock {
    /// Creates a condition bound to the write lock.
    pub fn new_condition(&self) -> Condition<RwPolicy> {
        Condition::new(Arc::clone(&self.sync))
    }

    /// Returns `true` if the calling thread holds the write lock.
    pub fn is_held_by_current_thread(&self) -> bool {
        self.sync.is_held_exclusively()
    }
}

impl Lock for WriteLock {
    fn lock(&self) {
        self.sync.acquire(1);
    }

    fn try_lock(&self) -> bool {
        self.sync.try_acquire(1)
    }

    fn try_lock_for(&self, timeout: Duration) -> Result<bool> {
        self.sync.try_acquire_for(1, timeout)
    }

    fn lock_interruptibly(&self) -> Result<()> {
        self.sync.acquire_interruptibly(1)
    }

    fn unlock(&self) -> Result<()> {
        self.sync.release(1).map(|_| ())
    }
}

impl fmt::Debug for WriteLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteLock")
            .field("state", self.sync.state())
            .finish()
    }
}
