//! Thread identity and interruption.
//!
//! Every thread that touches a lock in this crate gets a lazily created
//! [`ThreadHandle`] stored in a thread local. The handle carries:
//!
//! - a [`ThreadToken`], the structural identity recorded as a lock owner,
//! - an interrupt flag, used by the interruptible and timed acquisition paths,
//! - the [`Parker`] the synchronizer blocks the thread on.
//!
//! Handles are cheap to clone and can be sent to other threads, which is how
//! one thread interrupts another one that is blocked on a lock.

use crate::park::Parker;

use std::cell::OnceCell;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

/// Source of fresh thread tokens. Zero is reserved for "no owner".
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a thread, stable for the lifetime of the thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadToken(NonZeroU64);

impl ThreadToken {
    fn next() -> Self {
        let raw = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    /// Returns the raw numeric value of the token.
    pub fn as_u64(self) -> u64 {
        self.0.get()
    }

    pub(crate) fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }
}

impl fmt::Display for ThreadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread#{}", self.0)
    }
}

struct Inner {
    token: ThreadToken,
    interrupted: AtomicBool,
    parker: Parker,
}

/// Shared handle to a thread known to the lock machinery.
#[derive(Clone)]
pub struct ThreadHandle {
    inner: Arc<Inner>,
}

impl ThreadHandle {
    fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                token: ThreadToken::next(),
                interrupted: AtomicBool::new(false),
                parker: Parker::new(),
            }),
        }
    }

    /// Returns the identity of the thread behind this handle.
    pub fn token(&self) -> ThreadToken {
        self.inner.token
    }

    /// Interrupts the thread.
    ///
    /// Sets the interrupt flag and wakes the thread if it is parked. An
    /// interruptible or timed acquisition in progress on that thread gives up
    /// with [`Error::Interrupted`](crate::Error::Interrupted); an
    /// uninterruptible one keeps waiting and leaves the flag set when it returns.
    pub fn interrupt(&self) {
        self.inner.interrupted.store(true, Ordering::SeqCst);
        self.inner.parker.unpark();
    }

    /// Returns `true` if the interrupt flag is set. Does not clear it.
    pub fn is_interrupted(&self) -> bool {
        self.inner.interrupted.load(Ordering::SeqCst)
    }

    /// Re-asserts the interrupt flag without waking anyone.
    pub(crate) fn set_interrupted(&self) {
        self.inner.interrupted.store(true, Ordering::SeqCst);
    }

    /// Blocks the calling thread until unparked, interrupted or past `deadline`.
    ///
    /// Returns immediately if the interrupt flag is already set. Spurious
    /// returns are possible; callers re-check their condition in a loop.
    pub(crate) fn park(&self, deadline: Option<Instant>) {
        if self.is_interrupted() {
            return;
        }

        self.inner.parker.park(deadline);
    }

    pub(crate) fn unpark(&self) {
        self.inner.parker.unpark();
    }
}

impl fmt::Debug for ThreadHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadHandle")
            .field("token", &self.inner.token)
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}

thread_local! {
    /// Handle of the calling thread, created on first use.
    static CURRENT: OnceCell<ThreadHandle> = const { OnceCell::new() };
}

/// Returns the handle of the calling thread.
pub fn current() -> ThreadHandle {
    CURRENT.with(|cell| cell.get_or_init(ThreadHandle::new).clone())
}

/// Returns the token of the calling thread.
pub fn token() -> ThreadToken {
    CURRENT.with(|cell| cell.get_or_init(ThreadHandle::new).token())
}

/// Tests and clears the calling thread's interrupt flag.
pub fn interrupted() -> bool {
    CURRENT.with(|cell| {
        cell.get_or_init(ThreadHandle::new)
            .inner
            .interrupted
            .swap(false, Ordering::SeqCst)
    })
}
