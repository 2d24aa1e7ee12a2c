use super::sys;

use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering::{Acquire, Release};
use std::time::Instant;

/// No token is available and nobody is parked.
const EMPTY: u32 = 0;

/// A wake token is available; the next park consumes it.
const NOTIFIED: u32 = 1;

/// The owning thread is parked (or about to be) on the word.
const PARKED: u32 = u32::MAX;

/// A parker backed by a single 32-bit word the OS can wait on.
///
/// Only the owning thread parks; any thread may unpark.
pub(crate) struct Parker {
    state: AtomicU32,
}

impl Parker {
    pub(crate) const fn new() -> Self {
        Self {
            state: AtomicU32::new(EMPTY),
        }
    }

    /// Parks until a token is available or `deadline` passes.
    pub(crate) fn park(&self, deadline: Option<Instant>) {
        // NOTIFIED => EMPTY consumes the token, EMPTY => PARKED announces us.
        if self.state.fetch_sub(1, Acquire) == NOTIFIED {
            return;
        }

        loop {
            let timeout = match deadline {
                Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                    Some(left) if !left.is_zero() => Some(left),
                    _ => break,
                },
                None => None,
            };

            sys::wait(&self.state, PARKED, timeout);

            if self
                .state
                .compare_exchange(NOTIFIED, EMPTY, Acquire, Acquire)
                .is_ok()
            {
                return;
            }
        }

        // Timed out. Also swallows a token that raced with the deadline.
        self.state.swap(EMPTY, Acquire);
    }

    /// Makes a token available and wakes the owner if it is parked.
    pub(crate) fn unpark(&self) {
        if self.state.swap(NOTIFIED, Release) == PARKED {
            sys::wake_one(&self.state);
        }
    }
}
