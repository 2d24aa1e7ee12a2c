use super::node::Mode;
use super::queue::Critical;
use super::{NIL, SharedPolicy, Synchronizer};
use crate::error::{Error, Result};
use crate::thread::{self, ThreadHandle};

use std::time::{Duration, Instant};
use tracing::trace;

/// How a queued shared acquisition may end early.
#[derive(Clone, Copy)]
enum Wait {
    Uninterruptible,
    Interruptible,
    Until(Instant),
}

/// Result of a queued shared acquisition.
enum Outcome {
    Acquired { interrupted: bool },
    Interrupted,
    TimedOut,
}

impl<P: SharedPolicy> Synchronizer<P> {
    /// Tries to acquire in shared mode without queueing.
    ///
    /// Returns the policy's result: negative on failure, otherwise the
    /// remaining capacity hint.
    pub fn try_acquire_shared(&self, arg: i64) -> i64 {
        self.policy.try_acquire_shared(self, arg)
    }

    /// Acquires in shared mode, blocking until a share is granted.
    pub fn acquire_shared(&self, arg: i64) {
        if self.try_acquire_shared(arg) >= 0 {
            return;
        }

        if let Outcome::Acquired { interrupted: true } =
            self.do_acquire_shared(arg, Wait::Uninterruptible)
        {
            thread::current().set_interrupted();
        }
    }

    /// Acquires in shared mode, giving up with [`Error::Interrupted`].
    pub fn acquire_shared_interruptibly(&self, arg: i64) -> Result<()> {
        if thread::interrupted() {
            return Err(Error::Interrupted);
        }

        if self.try_acquire_shared(arg) >= 0 {
            return Ok(());
        }

        match self.do_acquire_shared(arg, Wait::Interruptible) {
            Outcome::Acquired { .. } => Ok(()),
            Outcome::Interrupted | Outcome::TimedOut => Err(Error::Interrupted),
        }
    }

    /// Acquires in shared mode, waiting at most `timeout`.
    pub fn try_acquire_shared_for(&self, arg: i64, timeout: Duration) -> Result<bool> {
        if thread::interrupted() {
            return Err(Error::Interrupted);
        }

        if self.try_acquire_shared(arg) >= 0 {
            return Ok(true);
        }

        if timeout.is_zero() {
            return Ok(false);
        }

        let wait = match Instant::now().checked_add(timeout) {
            Some(deadline) => Wait::Until(deadline),
            None => Wait::Interruptible,
        };

        match self.do_acquire_shared(arg, wait) {
            Outcome::Acquired { .. } => Ok(true),
            Outcome::TimedOut => Ok(false),
            Outcome::Interrupted => Err(Error::Interrupted),
        }
    }

    /// Releases a share. Never blocks; wakes and propagates to queued
    /// shared waiters when the policy reports capacity.
    pub fn release_shared(&self, arg: i64) -> Result<bool> {
        if !self.policy.try_release_shared(self, arg)? {
            return Ok(false);
        }

        let _cs = self.queue.enter();
        self.queue.do_release_shared();

        Ok(true)
    }

    fn do_acquire_shared(&self, arg: i64, wait: Wait) -> Outcome {
        let me = thread::current();
        let mut cs = self.queue.enter();
        let index = self.queue.add_waiter(Mode::Shared, &me);
        let mut interrupted = false;

        loop {
            let pred = self.queue.node(index).prev();
            if pred == self.queue.head() {
                let remaining = self.try_acquire_shared(arg);
                if remaining >= 0 {
                    self.set_head_and_propagate(index, remaining);
                    return Outcome::Acquired { interrupted };
                }
            }

            let deadline = match wait {
                Wait::Until(deadline) => {
                    if Instant::now() >= deadline {
                        self.queue.cancel_acquire(index);
                        trace!(node = index, "timed out waiting for shared acquire");
                        return Outcome::TimedOut;
                    }
                    Some(deadline)
                }
                _ => None,
            };

            if !self.queue.should_park_after_failed_acquire(pred, index) {
                continue;
            }

            self.park_shared(&mut cs, &me, deadline);

            if thread::interrupted() {
                match wait {
                    Wait::Uninterruptible => interrupted = true,
                    Wait::Interruptible | Wait::Until(_) => {
                        self.queue.cancel_acquire(index);
                        return Outcome::Interrupted;
                    }
                }
            }
        }
    }

    fn park_shared(&self, cs: &mut Critical<'_>, me: &ThreadHandle, deadline: Option<Instant>) {
        match deadline {
            Some(deadline) => {
                let left = deadline.saturating_duration_since(Instant::now());
                if left > self.queue.spin_threshold {
                    cs.park(me, Some(deadline));
                } else {
                    std::hint::spin_loop();
                }
            }
            None => cs.park(me, None),
        }
    }

    /// Becomes head and, if capacity may remain, wakes the next shared waiter.
    fn set_head_and_propagate(&self, index: u32, remaining: i64) {
        let old = self.queue.head();
        self.queue.set_head(index);

        let propagate = remaining > 0
            || self.queue.node(old).status() < 0
            || self.queue.node(self.queue.head()).status() < 0;

        if propagate {
            let next = self.queue.node(index).next();
            if next == NIL || self.queue.node(next).is_shared() {
                self.queue.do_release_shared();
            }
        }
    }
}

