use super::node::Mode;
use super::queue::Critical;
use super::{ExclusivePolicy, Synchronizer};
use crate::error::{Error, Result};
use crate::thread::{self, ThreadHandle};

use std::time::{Duration, Instant};
use tracing::trace;

impl<P: ExclusivePolicy> Synchronizer<P> {
    /// Tries to acquire exclusively without queueing.
    pub fn try_acquire(&self, arg: i64) -> bool {
        self.policy.try_acquire(self, arg)
    }

    /// Acquires exclusively, blocking until the state is granted.
    ///
    /// Interrupts are ignored while waiting; if one arrived, the thread's
    /// interrupt flag is set again on return.
    pub fn acquire(&self, arg: i64) {
        if self.try_acquire(arg) {
            return;
        }

        let me = thread::current();
        let mut cs = self.queue.enter();
        let index = self.queue.add_waiter(Mode::Exclusive, &me);

        if self.acquire_queued(&mut cs, &me, index, arg) {
            me.set_interrupted();
        }
    }

    /// Acquires exclusively, giving up with [`Error::Interrupted`] if the
    /// thread is interrupted before or while waiting.
    pub fn acquire_interruptibly(&self, arg: i64) -> Result<()> {
        if thread::interrupted() {
            return Err(Error::Interrupted);
        }

        if self.try_acquire(arg) {
            return Ok(());
        }

        let me = thread::current();
        let mut cs = self.queue.enter();
        let index = self.queue.add_waiter(Mode::Exclusive, &me);

        loop {
            let pred = self.queue.node(index).prev();
            if pred == self.queue.head() && self.try_acquire(arg) {
                self.queue.set_head(index);
                return Ok(());
            }

            if self.queue.should_park_after_failed_acquire(pred, index) {
                cs.park(&me, None);

                if thread::interrupted() {
                    self.queue.cancel_acquire(index);
                    return Err(Error::Interrupted);
                }
            }
        }
    }

    /// Acquires exclusively, waiting at most `timeout`.
    ///
    /// Returns `Ok(false)` if the time ran out, which is distinct from the
    /// immediate `false` of [`try_acquire`](Self::try_acquire).
    pub fn try_acquire_for(&self, arg: i64, timeout: Duration) -> Result<bool> {
        if thread::interrupted() {
            return Err(Error::Interrupted);
        }

        if self.try_acquire(arg) {
            return Ok(true);
        }

        if timeout.is_zero() {
            return Ok(false);
        }

        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return self.acquire_interruptibly(arg).map(|()| true);
        };

        let me = thread::current();
        let mut cs = self.queue.enter();
        let index = self.queue.add_waiter(Mode::Exclusive, &me);

        loop {
            let pred = self.queue.node(index).prev();
            if pred == self.queue.head() && self.try_acquire(arg) {
                self.queue.set_head(index);
                return Ok(true);
            }

            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                self.queue.cancel_acquire(index);
                trace!(node = index, "timed out waiting for exclusive acquire");
                return Ok(false);
            }

            if self.queue.should_park_after_failed_acquire(pred, index) {
                if left > self.queue.spin_threshold {
                    cs.park(&me, Some(deadline));
                } else {
                    std::hint::spin_loop();
                }
            }

            if thread::interrupted() {
                self.queue.cancel_acquire(index);
                return Err(Error::Interrupted);
            }
        }
    }

    /// Releases exclusively and wakes the next waiter if the state became free.
    pub fn release(&self, arg: i64) -> Result<bool> {
        if !self.policy.try_release(self, arg)? {
            return Ok(false);
        }

        if self.queue.has_queued_threads() {
            let _cs = self.queue.enter();
            let head = self.queue.head();

            if self.queue.node(head).status() != 0 {
                self.queue.unpark_successor(head);
            }
        }

        Ok(true)
    }

    /// Returns `true` if the calling thread holds the state exclusively.
    pub fn is_held_exclusively(&self) -> bool {
        self.policy.is_held_exclusively(self)
    }

    /// Releases the whole state and returns it, for condition waits.
    pub(crate) fn fully_release(&self) -> Result<i64> {
        let saved = self.state.get();

        match self.release(saved)? {
            true => Ok(saved),
            false => Err(Error::IllegalState("lock was not fully released")),
        }
    }

    /// Waits in the queue until `index` acquires with `arg`.
    ///
    /// Returns `true` if the thread was interrupted while waiting.
    pub(crate) fn acquire_queued(
        &self,
        cs: &mut Critical<'_>,
        me: &ThreadHandle,
        index: u32,
        arg: i64,
    ) -> bool {
        let mut interrupted = false;

        loop {
            let pred = self.queue.node(index).prev();
            if pred == self.queue.head() && self.try_acquire(arg) {
                self.queue.set_head(index);
                return interrupted;
            }

            if self.queue.should_park_after_failed_acquire(pred, index) {
                cs.park(me, None);

                if thread::interrupted() {
                    interrupted = true;
                }
            }
        }
    }
}
