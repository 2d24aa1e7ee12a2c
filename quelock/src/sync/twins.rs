use super::condition::Condition;
use super::core::{SharedPolicy, Synchronizer};
use super::lock::Lock;
use crate::builder::SyncBuilder;
use crate::error::{Error, Result};
use crate::thread;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// State policy of [`TwinsLock`]: the state word is the number of free permits.
#[derive(Debug)]
pub struct TwinsPolicy {
    permits: i64,
}

impl SharedPolicy for TwinsPolicy {
    fn try_acquire_shared(&self, sync: &Synchronizer<Self>, arg: i64) -> i64 {
        let state = sync.state();

        loop {
            let current = state.get();
            let remaining = current - arg;

            if remaining < 0 || state.compare_and_set(current, remaining) {
                return remaining;
            }
        }
    }

    fn try_release_shared(&self, sync: &Synchronizer<Self>, arg: i64) -> Result<bool> {
        let state = sync.state();

        loop {
            let current = state.get();
            let next = current + arg;

            if next > self.permits {
                debug!(thread = %thread::token(), "twins lock released more permits than it has");
                return Err(Error::IllegalState("twins lock released without a held permit"));
            }

            if state.compare_and_set(current, next) {
                return Ok(true);
            }
        }
    }
}

/// A shared lock that admits at most a fixed number of holders at once.
///
/// The default capacity is two, hence the name. Permits are not owned: any
/// thread may give one back, as long as the total never exceeds the capacity.
/// Timed, interruptible and condition operations are not offered and fail
/// with [`Error::Unsupported`].
///
/// # Examples
///
/// ```rust
/// use quelock::TwinsLock;
///
/// let lock = TwinsLock::new();
/// assert!(lock.try_lock());
/// assert!(lock.try_lock());
/// assert!(!lock.try_lock());
/// lock.unlock().unwrap();
/// assert_eq!(lock.available_permits(), 1);
/// ```
#[derive(Clone)]
pub struct TwinsLock {
    sync: Arc<Synchronizer<TwinsPolicy>>,
}

impl TwinsLock {
    /// Creates a lock with two permits.
    pub fn new() -> Self {
        Self::build(SyncBuilder::new(), 2)
    }

    /// Creates a lock with `permits` permits.
    ///
    /// Fails with [`Error::InvalidArgument`] unless `permits > 0`.
    pub fn with_permits(permits: i64) -> Result<Self> {
        Self::with_builder(SyncBuilder::new(), permits)
    }

    /// Creates a lock with `permits` permits and a configured wait queue.
    pub fn with_builder(builder: SyncBuilder, permits: i64) -> Result<Self> {
        if permits <= 0 {
            return Err(Error::InvalidArgument("twins lock needs at least one permit"));
        }

        Ok(Self::build(builder, permits))
    }

    fn build(builder: SyncBuilder, permits: i64) -> Self {
        Self {
            sync: Arc::new(builder.build(TwinsPolicy { permits }, permits)),
        }
    }

    /// Takes a permit, blocking until one is free.
    pub fn lock(&self) {
        self.sync.acquire_shared(1);
    }

    /// Takes a permit only if one is free right now.
    pub fn try_lock(&self) -> bool {
        self.sync.try_acquire_shared(1) >= 0
    }

    /// Not supported.
    pub fn try_lock_for(&self, _timeout: Duration) -> Result<bool> {
        Err(Error::Unsupported("twins lock has no timed acquisition"))
    }

    /// Not supported.
    pub fn lock_interruptibly(&self) -> Result<()> {
        Err(Error::Unsupported("twins lock has no interruptible acquisition"))
    }

    /// Gives a permit back and wakes waiting threads.
    ///
    /// Fails with [`Error::IllegalState`] if every permit is already free.
    pub fn unlock(&self) -> Result<()> {
        self.sync.release_shared(1).map(|_| ())
    }

    /// Not supported.
    pub fn new_condition(&self) -> Result<Condition<TwinsPolicy>> {
        Err(Error::Unsupported("twins lock has no conditions"))
    }

    /// Number of permits currently free.
    pub fn available_permits(&self) -> i64 {
        self.sync.state().get()
    }

    /// Total number of permits.
    pub fn permits(&self) -> i64 {
        self.sync.policy().permits
    }

    /// Returns `true` if any thread may be waiting for a permit.
    pub fn has_queued_threads(&self) -> bool {
        self.sync.has_queued_threads()
    }
}

impl Default for TwinsLock {
    fn default() -> Self {
        Self::new()
    }
}

impl Lock for TwinsLock {
    fn lock(&self) {
        TwinsLock::lock(self);
    }

    fn try_lock(&self) -> bool {
        TwinsLock::try_lock(self)
    }

    fn try_lock_for(&self, timeout: Duration) -> Result<bool> {
        TwinsLock::try_lock_for(self, timeout)
    }

    fn lock_interruptibly(&self) -> Result<()> {
        TwinsLock::lock_interruptibly(self)
    }

    fn unlock(&self) -> Result<()> {
        TwinsLock::unlock(self)
    }
}

impl fmt::Debug for TwinsLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwinsLock")
            .field("available", &self.available_permits())
            .field("permits", &self.permits())
            .finish()
    }
}
