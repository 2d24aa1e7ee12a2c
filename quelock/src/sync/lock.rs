use crate::error::Result;

use std::time::Duration;
use tracing::warn;

/// Common interface of the blocking locks in this crate.
///
/// Locks that cannot offer an operation return
/// [`Error::Unsupported`](crate::Error::Unsupported) from it instead of
/// blocking.
pub trait Lock {
    /// Acquires the lock, blocking until it is available.
    fn lock(&self);

    /// Acquires the lock only if it is free right now.
    fn try_lock(&self) -> bool;

    /// Acquires the lock, waiting at most `timeout`.
    ///
    /// Returns `Ok(false)` if the time ran out.
    fn try_lock_for(&self, timeout: Duration) -> Result<bool>;

    /// Acquires the lock unless the calling thread is interrupted.
    fn lock_interruptibly(&self) -> Result<()>;

    /// Releases the lock.
    fn unlock(&self) -> Result<()>;

    /// Acquires the lock and returns a guard that releases it on drop.
    fn guard(&self) -> LockGuard<'_, Self>
    where
        Self: Sized,
    {
        self.lock();
        LockGuard { lock: self }
    }
}

/// Guard returned by [`Lock::guard`].
///
/// Releases the lock when dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard<'a, L: Lock> {
    lock: &'a L,
}

impl<L: Lock> LockGuard<'_, L> {
    /// Releases the lock now and reports a usage error, if any.
    pub fn unlock(self) -> Result<()> {
        let lock = self.lock;
        std::mem::forget(self);
        lock.unlock()
    }
}

impl<L: Lock> Drop for LockGuard<'_, L> {
    fn drop(&mut self) {
        if let Err(err) = self.lock.unlock() {
            warn!(%err, "failed to release lock from guard");
        }
    }
}
