use crate::thread::ThreadHandle;

use parking_lot::Mutex;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::atomic::{AtomicI32, AtomicU8, AtomicU32, AtomicU64};

/// Null link between nodes.
pub(crate) const NIL: u32 = u32::MAX;

/// Wait status values.
pub(crate) mod status {
    /// Initial status of a queued node.
    pub(crate) const INITIAL: i32 = 0;

    /// The node gave up (timeout or interrupt) and will never acquire.
    ///
    /// Cancelled is the only positive status, so `status > 0` reads as
    /// "skip this node".
    pub(crate) const CANCELLED: i32 = 1;

    /// The successor is, or is about to be, parked and must be unparked
    /// when this node releases or cancels.
    pub(crate) const SIGNAL: i32 = -1;

    /// The node sits on a condition list, not on the sync queue.
    pub(crate) const CONDITION: i32 = -2;

    /// A shared release happened while the head had no SIGNAL mark; the
    /// next shared acquirer must keep propagating.
    pub(crate) const PROPAGATE: i32 = -3;
}

/// Acquisition mode of a queued node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum Mode {
    Exclusive = 0,
    Shared = 1,
}

/// One slot of the node arena.
///
/// Links are arena indices. A node is reset every time its slot is handed
/// out again, so nothing here is meaningful for a free slot.
pub(crate) struct Node {
    status: AtomicI32,
    prev: AtomicU32,
    next: AtomicU32,
    /// Link to the next node on a condition list.
    next_waiter: AtomicU32,
    mode: AtomicU8,
    /// Queue position, strictly increasing from head to tail.
    seq: AtomicU64,
    thread: Mutex<Option<ThreadHandle>>,
}

impl Default for Node {
    fn default() -> Self {
        Self {
            status: AtomicI32::new(status::INITIAL),
            prev: AtomicU32::new(NIL),
            next: AtomicU32::new(NIL),
            next_waiter: AtomicU32::new(NIL),
            mode: AtomicU8::new(Mode::Exclusive as u8),
            seq: AtomicU64::new(0),
            thread: Mutex::new(None),
        }
    }
}

impl Node {
    pub(crate) fn reset(&self, mode: Mode, status: i32, thread: Option<ThreadHandle>) {
        self.status.store(status, SeqCst);
        self.prev.store(NIL, SeqCst);
        self.next.store(NIL, SeqCst);
        self.next_waiter.store(NIL, SeqCst);
        self.mode.store(mode as u8, SeqCst);
        self.seq.store(0, SeqCst);
        *self.thread.lock() = thread;
    }

    pub(crate) fn status(&self) -> i32 {
        self.status.load(SeqCst)
    }

    pub(crate) fn set_status(&self, status: i32) {
        self.status.store(status, SeqCst);
    }

    pub(crate) fn cas_status(&self, expect: i32, status: i32) -> bool {
        self.status
            .compare_exchange(expect, status, SeqCst, SeqCst)
            .is_ok()
    }

    pub(crate) fn prev(&self) -> u32 {
        self.prev.load(SeqCst)
    }

    pub(crate) fn set_prev(&self, prev: u32) {
        self.prev.store(prev, SeqCst);
    }

    pub(crate) fn next(&self) -> u32 {
        self.next.load(SeqCst)
    }

    pub(crate) fn set_next(&self, next: u32) {
        self.next.store(next, SeqCst);
    }

    pub(crate) fn cas_next(&self, expect: u32, next: u32) -> bool {
        self.next.compare_exchange(expect, next, SeqCst, SeqCst).is_ok()
    }

    pub(crate) fn next_waiter(&self) -> u32 {
        self.next_waiter.load(SeqCst)
    }

    pub(crate) fn set_next_waiter(&self, next: u32) {
        self.next_waiter.store(next, SeqCst);
    }

    pub(crate) fn is_shared(&self) -> bool {
        self.mode.load(SeqCst) == Mode::Shared as u8
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq.load(SeqCst)
    }

    pub(crate) fn set_seq(&self, seq: u64) {
        self.seq.store(seq, SeqCst);
    }

    pub(crate) fn has_thread(&self) -> bool {
        self.thread.lock().is_some()
    }

    pub(crate) fn clear_thread(&self) {
        *self.thread.lock() = None;
    }

    /// Wakes the waiting thread, if the node still has one.
    pub(crate) fn unpark(&self) {
        let thread = self.thread.lock().clone();

        if let Some(thread) = thread {
            thread.unpark();
        }
    }
}
