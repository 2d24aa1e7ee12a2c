//! Condition variables bound to an exclusive lock.
//!
//! A [`Condition`] keeps its own singly linked list of waiter nodes, taken
//! from the same arena as the lock's sync queue. Waiting moves a node from
//! the condition list onto the sync queue in two ways:
//!
//! - a [`signal`](Condition::signal) transfers it, after which the waiter
//!   competes for the lock like any other queued thread,
//! - an interrupt or timeout makes the waiter transfer itself.
//!
//! The list links are only touched while the lock is held exclusively.

use super::core::{Critical, ExclusivePolicy, Mode, NIL, Synchronizer, status};
use crate::error::{Error, Result};
use crate::thread::{self, ThreadHandle};

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering::Relaxed;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// What an interrupt during a wait turns into once the lock is reacquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    None,
    /// Interrupted before being signalled: report [`Error::Interrupted`].
    Throw,
    /// Interrupted after being signalled: set the flag again.
    Reassert,
}

/// A condition variable tied to one exclusive lock.
///
/// Obtained from [`ExclusiveMutex::new_condition`](crate::ExclusiveMutex::new_condition)
/// or [`WriteLock::new_condition`](crate::WriteLock::new_condition). Every
/// operation requires the calling thread to hold that lock and fails with
/// [`Error::IllegalState`] otherwise.
pub struct Condition<P> {
    sync: Arc<Synchronizer<P>>,
    // Guarded by the lock.
    first: AtomicU32,
    last: AtomicU32,
}

impl<P: ExclusivePolicy> Condition<P> {
    pub(crate) fn new(sync: Arc<Synchronizer<P>>) -> Self {
        Self {
            sync,
            first: AtomicU32::new(NIL),
            last: AtomicU32::new(NIL),
        }
    }

    /// Returns `true` if this condition belongs to `sync`.
    pub(crate) fn is_bound_to(&self, sync: &Arc<Synchronizer<P>>) -> bool {
        Arc::ptr_eq(&self.sync, sync)
    }

    /// Releases the lock, waits for a signal, and reacquires the lock.
    ///
    /// The lock is held again when this returns, whatever the outcome. Fails
    /// with [`Error::Interrupted`] if the thread was interrupted before the
    /// call or before being signalled. An interrupt that arrives after the
    /// signal is kept in the thread's interrupt flag instead.
    pub fn wait(&self) -> Result<()> {
        self.ensure_held()?;

        if thread::interrupted() {
            return Err(Error::Interrupted);
        }

        let me = thread::current();
        let queue = self.sync.queue();
        let mut cs = queue.enter();

        let index = self.add_waiter(&me);
        let saved = self.release_for_wait(index)?;
        let mut interrupt = Interrupt::None;

        while !queue.is_on_sync_queue(index) {
            cs.park(&me, None);

            interrupt = self.check_interrupt_while_waiting(index);
            if interrupt != Interrupt::None {
                break;
            }
        }

        self.reacquire(&mut cs, &me, index, saved, interrupt, false)
            .map(|_| ())
    }

    /// Like [`wait`](Self::wait), but keeps waiting through interrupts.
    ///
    /// An interrupt received while waiting is re-asserted on return.
    pub fn wait_uninterruptibly(&self) -> Result<()> {
        self.ensure_held()?;

        let me = thread::current();
        let queue = self.sync.queue();
        let mut cs = queue.enter();

        let index = self.add_waiter(&me);
        let saved = self.release_for_wait(index)?;
        let mut interrupt = Interrupt::None;

        while !queue.is_on_sync_queue(index) {
            cs.park(&me, None);

            if thread::interrupted() {
                interrupt = Interrupt::Reassert;
            }
        }

        self.reacquire(&mut cs, &me, index, saved, interrupt, false)
            .map(|_| ())
    }

    /// Like [`wait`](Self::wait), but gives up after `timeout`.
    ///
    /// Returns `Ok(false)` if the time ran out before a signal arrived. The
    /// lock is reacquired in both cases.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<bool> {
        self.ensure_held()?;

        if thread::interrupted() {
            return Err(Error::Interrupted);
        }

        let me = thread::current();
        let queue = self.sync.queue();
        let mut cs = queue.enter();

        let index = self.add_waiter(&me);
        let saved = self.release_for_wait(index)?;
        let deadline = Instant::now().checked_add(timeout);
        let mut interrupt = Interrupt::None;
        let mut timed_out = false;

        while !queue.is_on_sync_queue(index) {
            match deadline {
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        timed_out = queue.transfer_after_cancelled_wait(index);
                        break;
                    }

                    if left > queue.spin_threshold {
                        cs.park(&me, Some(deadline));
                    } else {
                        std::hint::spin_loop();
                    }
                }
                None => cs.park(&me, None),
            }

            interrupt = self.check_interrupt_while_waiting(index);
            if interrupt != Interrupt::None {
                break;
            }
        }

        if timed_out {
            trace!(node = index, "condition wait timed out");
        }

        self.reacquire(&mut cs, &me, index, saved, interrupt, timed_out)
            .map(|()| !timed_out)
    }

    /// Moves the longest-waiting thread back to the lock's queue.
    ///
    /// Does nothing if no thread is waiting.
    pub fn signal(&self) -> Result<()> {
        self.ensure_held()?;

        let queue = self.sync.queue();
        let _cs = queue.enter();
        let mut first = self.first.load(Relaxed);

        while first != NIL {
            let next = queue.node(first).next_waiter();
            self.first.store(next, Relaxed);
            if next == NIL {
                self.last.store(NIL, Relaxed);
            }
            queue.node(first).set_next_waiter(NIL);

            if queue.transfer_for_signal(first) {
                break;
            }

            first = next;
        }

        Ok(())
    }

    /// Moves every waiting thread back to the lock's queue, oldest first.
    pub fn signal_all(&self) -> Result<()> {
        self.ensure_held()?;

        let queue = self.sync.queue();
        let _cs = queue.enter();
        let mut first = self.first.swap(NIL, Relaxed);
        self.last.store(NIL, Relaxed);

        while first != NIL {
            let next = queue.node(first).next_waiter();
            queue.node(first).set_next_waiter(NIL);
            queue.transfer_for_signal(first);
            first = next;
        }

        Ok(())
    }

    /// Returns `true` if any thread is waiting on this condition.
    pub fn has_waiters(&self) -> Result<bool> {
        Ok(self.wait_queue_length()? > 0)
    }

    /// Number of threads waiting on this condition.
    pub fn wait_queue_length(&self) -> Result<usize> {
        self.ensure_held()?;

        let queue = self.sync.queue();
        let _cs = queue.enter();
        let mut count = 0;
        let mut w = self.first.load(Relaxed);

        while w != NIL {
            if queue.node(w).status() == status::CONDITION {
                count += 1;
            }
            w = queue.node(w).next_waiter();
        }

        Ok(count)
    }

    fn ensure_held(&self) -> Result<()> {
        if self.sync.is_held_exclusively() {
            return Ok(());
        }

        debug!(thread = %thread::token(), "condition used without holding its lock");
        Err(Error::IllegalState("condition used without holding its lock"))
    }

    /// Appends a CONDITION node for `me` to the list.
    fn add_waiter(&self, me: &ThreadHandle) -> u32 {
        let queue = self.sync.queue();
        let last = self.last.load(Relaxed);

        if last != NIL && queue.node(last).status() != status::CONDITION {
            self.unlink_cancelled_waiters();
        }

        let index = queue.alloc(Mode::Exclusive, status::CONDITION, Some(me.clone()));

        match self.last.load(Relaxed) {
            NIL => self.first.store(index, Relaxed),
            last => queue.node(last).set_next_waiter(index),
        }
        self.last.store(index, Relaxed);

        trace!(node = index, thread = %me.token(), "condition waiter added");
        index
    }

    /// Fully releases the lock for a wait, undoing the enqueue on failure.
    fn release_for_wait(&self, index: u32) -> Result<i64> {
        match self.sync.fully_release() {
            Ok(saved) => Ok(saved),
            Err(err) => {
                let queue = self.sync.queue();
                queue.node(index).set_status(status::CANCELLED);
                self.unlink_cancelled_waiters();
                queue.retire(index);

                debug!(node = index, %err, "condition wait could not release its lock");
                Err(err)
            }
        }
    }

    fn check_interrupt_while_waiting(&self, index: u32) -> Interrupt {
        if !thread::interrupted() {
            return Interrupt::None;
        }

        if self.sync.queue().transfer_after_cancelled_wait(index) {
            Interrupt::Throw
        } else {
            Interrupt::Reassert
        }
    }

    /// Reacquires the lock with the saved state and settles the wait outcome.
    fn reacquire(
        &self,
        cs: &mut Critical<'_>,
        me: &ThreadHandle,
        index: u32,
        saved: i64,
        mut interrupt: Interrupt,
        timed_out: bool,
    ) -> Result<()> {
        if self.sync.acquire_queued(cs, me, index, saved) && interrupt != Interrupt::Throw {
            interrupt = Interrupt::Reassert;
        }

        // A node that cancelled itself is still linked on the list.
        let cancelled = timed_out || interrupt == Interrupt::Throw;
        if cancelled || self.sync.queue().node(index).next_waiter() != NIL {
            self.unlink_cancelled_waiters();
        }

        match interrupt {
            Interrupt::Throw => Err(Error::Interrupted),
            Interrupt::Reassert => {
                me.set_interrupted();
                Ok(())
            }
            Interrupt::None => Ok(()),
        }
    }

    /// Drops every node that is no longer waiting from the list.
    fn unlink_cancelled_waiters(&self) {
        let queue = self.sync.queue();
        let mut t = self.first.load(Relaxed);
        let mut trail = NIL;

        while t != NIL {
            let node = queue.node(t);
            let next = node.next_waiter();

            if node.status() != status::CONDITION {
                node.set_next_waiter(NIL);

                if trail == NIL {
                    self.first.store(next, Relaxed);
                } else {
                    queue.node(trail).set_next_waiter(next);
                }
                if next == NIL {
                    self.last.store(trail, Relaxed);
                }
            } else {
                trail = t;
            }

            t = next;
        }
    }
}

impl<P> fmt::Debug for Condition<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition")
            .field("first", &self.first.load(Relaxed))
            .field("last", &self.last.load(Relaxed))
            .finish()
    }
}
