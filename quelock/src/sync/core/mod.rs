//! The queue-based synchronizer every lock in this crate delegates to.
//!
//! A [`Synchronizer`] owns three things:
//!
//! - a [`SyncState`]: one atomic integer plus an optional owner token,
//! - a FIFO wait queue of arena nodes for threads that failed the fast path,
//! - a policy that gives the state word its meaning.
//!
//! Policies come in two flavours. An [`ExclusivePolicy`] decides whether a
//! single owner may take or give back the state; a [`SharedPolicy`] does the
//! same for any number of concurrent holders. A lock implements only the
//! traits it needs, and the matching half of the synchronizer API becomes
//! available for it.
//!
//! ## Protocol
//!
//! Acquisition first tries the policy directly (barging is allowed). On
//! failure the thread enqueues a node and loops: when its predecessor is the
//! head it retries the policy, otherwise it marks the predecessor SIGNAL,
//! re-checks, and parks. A release that frees the state unparks the first
//! live node after the head. Shared acquisitions keep waking the next shared
//! waiter while capacity remains.
//!
//! Timed and interruptible variants cancel their node before returning
//! failure, so a cancelled waiter is never handed the state and never hides a
//! live waiter behind it.

mod exclusive;
mod node;
mod queue;
mod shared;

pub(crate) use node::{Mode, NIL, status};
pub(crate) use queue::{Critical, WaitQueue};

use crate::builder::SyncBuilder;
use crate::error::Result;
use crate::thread::{self, ThreadToken};

use std::fmt;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::atomic::{AtomicI64, AtomicU64};

/// The state word of a synchronizer plus its exclusive owner.
pub struct SyncState {
    value: AtomicI64,
    owner: AtomicU64,
}

impl SyncState {
    fn new(value: i64) -> Self {
        Self {
            value: AtomicI64::new(value),
            owner: AtomicU64::new(0),
        }
    }

    /// Reads the state word.
    pub fn get(&self) -> i64 {
        self.value.load(SeqCst)
    }

    /// Writes the state word.
    ///
    /// Only safe for transitions no other thread can race with, such as an
    /// exclusive owner giving the lock back.
    pub fn set(&self, value: i64) {
        self.value.store(value, SeqCst);
    }

    /// Atomically replaces `expect` with `value`. Returns `false` on contention.
    pub fn compare_and_set(&self, expect: i64, value: i64) -> bool {
        self.value
            .compare_exchange(expect, value, SeqCst, SeqCst)
            .is_ok()
    }

    /// Thread currently recorded as exclusive owner.
    pub fn owner(&self) -> Option<ThreadToken> {
        ThreadToken::from_raw(self.owner.load(SeqCst))
    }

    /// Records (or clears) the exclusive owner.
    pub fn set_owner(&self, owner: Option<ThreadToken>) {
        self.owner.store(owner.map_or(0, ThreadToken::as_u64), SeqCst);
    }

    /// Returns `true` if the calling thread is the recorded owner.
    pub fn is_owned_by_current_thread(&self) -> bool {
        self.owner() == Some(thread::token())
    }
}

impl fmt::Debug for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncState")
            .field("value", &self.get())
            .field("owner", &self.owner())
            .finish()
    }
}

/// State transitions for exclusive (single owner) acquisition.
pub trait ExclusivePolicy: Sized {
    /// Tries to take the state for the calling thread. Must not block.
    fn try_acquire(&self, sync: &Synchronizer<Self>, arg: i64) -> bool;

    /// Gives the state back.
    ///
    /// Returns `Ok(true)` when the state became free and a waiter should be
    /// woken, or [`Error::IllegalState`](crate::Error::IllegalState) when the
    /// caller does not hold it.
    fn try_release(&self, sync: &Synchronizer<Self>, arg: i64) -> Result<bool>;

    /// Returns `true` if the calling thread holds the state exclusively.
    fn is_held_exclusively(&self, sync: &Synchronizer<Self>) -> bool;
}

/// State transitions for shared acquisition.
pub trait SharedPolicy: Sized {
    /// Tries to take a share of the state. Must not block.
    ///
    /// A negative result means failure. Zero means success with no capacity
    /// left for other shared acquirers; a positive value means success with
    /// capacity possibly remaining.
    fn try_acquire_shared(&self, sync: &Synchronizer<Self>, arg: i64) -> i64;

    /// Gives a share back. Never blocks; retries internally on contention.
    ///
    /// Returns `Ok(true)` if waiters may now be able to acquire.
    fn try_release_shared(&self, sync: &Synchronizer<Self>, arg: i64) -> Result<bool>;
}

/// A queue-based blocking synchronizer parameterized by a state policy.
pub struct Synchronizer<P> {
    state: SyncState,
    queue: WaitQueue,
    policy: P,
}

impl<P> Synchronizer<P> {
    /// Creates a synchronizer with default settings.
    pub fn new(policy: P, state: i64) -> Self {
        SyncBuilder::new().build(policy, state)
    }

    pub(crate) fn from_parts(policy: P, state: i64, queue: WaitQueue) -> Self {
        Self {
            state: SyncState::new(state),
            queue,
            policy,
        }
    }

    /// The state word and owner.
    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// The policy this synchronizer was built with.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Returns `true` if any thread may be waiting to acquire.
    pub fn has_queued_threads(&self) -> bool {
        self.queue.has_queued_threads()
    }

    /// Estimated number of threads waiting to acquire.
    pub fn queue_length(&self) -> usize {
        self.queue.queue_length()
    }

    /// Returns `true` if the first waiter in line wants exclusive mode.
    pub fn first_queued_is_exclusive(&self) -> bool {
        self.queue.first_queued_is_exclusive()
    }

    /// Number of node slots the wait queue has allocated.
    pub fn node_capacity(&self) -> usize {
        self.queue.node_capacity()
    }

    /// Number of node slots currently in use, including the dummy head.
    pub fn nodes_in_use(&self) -> usize {
        self.queue.nodes_in_use()
    }

    pub(crate) fn queue(&self) -> &WaitQueue {
        &self.queue
    }
}

impl<P: fmt::Debug> fmt::Debug for Synchronizer<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Synchronizer")
            .field("state", &self.state)
            .field("policy", &self.policy)
            .field("queued", &self.has_queued_threads())
            .finish()
    }
}
