//! Portable fallback backend: a flag guarded by a mutex and a condition variable.

use parking_lot::{Condvar, Mutex};
use std::time::Instant;

/// A parker for targets without a word-wait syscall.
pub(crate) struct Parker {
    notified: Mutex<bool>,
    cvar: Condvar,
}

impl Parker {
    pub(crate) const fn new() -> Self {
        Self {
            notified: Mutex::new(false),
            cvar: Condvar::new(),
        }
    }

    /// Parks until a token is available or `deadline` passes.
    pub(crate) fn park(&self, deadline: Option<Instant>) {
        let mut notified = self.notified.lock();

        while !*notified {
            match deadline {
                Some(deadline) => {
                    if self.cvar.wait_until(&mut notified, deadline).timed_out() {
                        break;
                    }
                }
                None => self.cvar.wait(&mut notified),
            }
        }

        *notified = false;
    }

    /// Makes a token available and wakes the owner if it is parked.
    pub(crate) fn unpark(&self) {
        *self.notified.lock() = true;
        self.cvar.notify_one();
    }
}
