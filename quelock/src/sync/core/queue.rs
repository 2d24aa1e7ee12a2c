//! The sync queue and its node arena.
//!
//! The queue is a doubly linked list of arena nodes with a dummy head. The
//! tail is advanced by CAS; the head is moved only by the thread that just
//! acquired through the node right after it.
//!
//! ## Node reclamation
//!
//! Slots are recycled, never freed, while the queue lives. A node is
//! *retired* once it cannot be reached from `head`/`tail` any more:
//!
//! - the old head, when the head advances,
//! - a cancelled tail, as soon as the tail has been swung back past it,
//! - any other cancelled node once its `seq` is below the new head's (every
//!   live node after the head links back through the head, and the head is
//!   never cancelled, so nothing live still points at it).
//!
//! Any thread that follows links does so inside a [`Critical`] section.
//! Retired slots are recycled only when a thread leaving its section sees
//! that no other section is open, which means every thread that could have
//! read a link to them is gone. Threads close their section before parking.

use super::node::{Mode, NIL, Node, status};
use crate::thread::ThreadHandle;
use crate::utils::Slab;

use parking_lot::Mutex;
use std::mem;
use std::sync::atomic::Ordering::SeqCst;
use std::sync::atomic::{AtomicU32, AtomicUsize};
use std::time::{Duration, Instant};
use tracing::trace;

pub(crate) struct WaitQueue {
    nodes: Slab<Node>,
    head: AtomicU32,
    tail: AtomicU32,

    /// Number of open critical sections.
    active: AtomicUsize,
    /// Retired nodes waiting for a quiescent point.
    limbo: Mutex<Vec<u32>>,
    limbo_len: AtomicUsize,
    /// Cancelled nodes that may still be linked from the live queue.
    cancelled: Mutex<Vec<u32>>,

    /// Timed waits shorter than this spin instead of parking.
    pub(crate) spin_threshold: Duration,
}

/// An open critical section on a [`WaitQueue`].
///
/// Node indices read through links stay valid until the section is dropped.
pub(crate) struct Critical<'a> {
    queue: &'a WaitQueue,
}

impl Critical<'_> {
    /// Closes the section, parks `thread`, and reopens it.
    pub(crate) fn park(&mut self, thread: &ThreadHandle, deadline: Option<Instant>) {
        self.queue.exit();
        thread.park(deadline);
        self.queue.active.fetch_add(1, SeqCst);
    }
}

impl Drop for Critical<'_> {
    fn drop(&mut self) {
        self.queue.exit();
    }
}

impl WaitQueue {
    pub(crate) fn new(initial_nodes: usize, spin_threshold: Duration) -> Self {
        let nodes: Slab<Node> = Slab::new(initial_nodes);
        let dummy = nodes.insert();
        nodes.get(dummy).reset(Mode::Exclusive, status::INITIAL, None);

        Self {
            nodes,
            head: AtomicU32::new(dummy),
            tail: AtomicU32::new(dummy),
            active: AtomicUsize::new(0),
            limbo: Mutex::new(Vec::new()),
            limbo_len: AtomicUsize::new(0),
            cancelled: Mutex::new(Vec::new()),
            spin_threshold,
        }
    }

    pub(crate) fn enter(&self) -> Critical<'_> {
        self.active.fetch_add(1, SeqCst);
        Critical { queue: self }
    }

    fn exit(&self) {
        if self.limbo_len.load(SeqCst) == 0 {
            self.active.fetch_sub(1, SeqCst);
            return;
        }

        // Only nodes retired before our decrement may be recycled.
        let batch = {
            let mut limbo = self.limbo.lock();
            self.limbo_len.store(0, SeqCst);
            mem::take(&mut *limbo)
        };

        if self.active.fetch_sub(1, SeqCst) == 1 {
            trace!(nodes = batch.len(), "recycling retired queue nodes");
            for index in batch {
                self.nodes.get(index).clear_thread();
                self.nodes.remove(index);
            }
        } else if !batch.is_empty() {
            let mut limbo = self.limbo.lock();
            limbo.extend(batch);
            self.limbo_len.store(limbo.len(), SeqCst);
        }
    }

    pub(crate) fn node(&self, index: u32) -> &Node {
        self.nodes.get(index)
    }

    pub(crate) fn head(&self) -> u32 {
        self.head.load(SeqCst)
    }

    pub(crate) fn tail(&self) -> u32 {
        self.tail.load(SeqCst)
    }

    pub(crate) fn node_capacity(&self) -> usize {
        self.nodes.capacity()
    }

    pub(crate) fn nodes_in_use(&self) -> usize {
        self.nodes.len()
    }

    /// Takes a fresh node out of the arena.
    pub(crate) fn alloc(&self, mode: Mode, status: i32, thread: Option<ThreadHandle>) -> u32 {
        let index = self.nodes.insert();
        self.node(index).reset(mode, status, thread);
        index
    }

    /// Appends `index` at the tail and returns its predecessor.
    pub(crate) fn enq(&self, index: u32) -> u32 {
        let node = self.node(index);

        loop {
            let tail = self.tail();
            let pred = self.node(tail);

            node.set_prev(tail);
            node.set_seq(pred.seq() + 1);

            if self
                .tail
                .compare_exchange(tail, index, SeqCst, SeqCst)
                .is_ok()
            {
                pred.set_next(index);
                return tail;
            }
        }
    }

    /// Creates a node for the calling thread and enqueues it.
    pub(crate) fn add_waiter(&self, mode: Mode, thread: &ThreadHandle) -> u32 {
        let index = self.alloc(mode, status::INITIAL, Some(thread.clone()));
        self.enq(index);

        trace!(node = index, ?mode, thread = %thread.token(), "queued waiter");
        index
    }

    /// Makes `index` the new dummy head and retires what it leaves behind.
    ///
    /// Called only by the thread that owns `index`, right after acquiring.
    pub(crate) fn set_head(&self, index: u32) {
        let old = self.head();
        let node = self.node(index);

        self.head.store(index, SeqCst);
        node.set_prev(NIL);
        node.clear_thread();

        let seq = node.seq();
        let mut cancelled = self.cancelled.lock();
        let mut limbo = self.limbo.lock();

        limbo.push(old);
        cancelled.retain(|&c| {
            if self.node(c).seq() < seq {
                limbo.push(c);
                false
            } else {
                true
            }
        });
        self.limbo_len.store(limbo.len(), SeqCst);
    }

    /// Retires a node that no queue root can reach any more.
    pub(crate) fn retire(&self, index: u32) {
        let mut limbo = self.limbo.lock();
        limbo.push(index);
        self.limbo_len.store(limbo.len(), SeqCst);
    }

    /// Records a cancelled node, retiring it at once if the head already passed it.
    fn retire_cancelled(&self, index: u32) {
        let head_seq = self.node(self.head()).seq();
        let mut cancelled = self.cancelled.lock();

        if self.node(index).seq() < head_seq {
            let mut limbo = self.limbo.lock();
            limbo.push(index);
            self.limbo_len.store(limbo.len(), SeqCst);
        } else {
            cancelled.push(index);
        }
    }

    /// Wakes the first live successor of `index`, if any.
    pub(crate) fn unpark_successor(&self, index: u32) {
        let node = self.node(index);
        let ws = node.status();
        if ws < 0 {
            node.cas_status(ws, status::INITIAL);
        }

        let mut successor = node.next();
        if successor == NIL || successor == index || self.node(successor).status() > 0 {
            // Forward links can lag behind; the prev chain from the tail is
            // authoritative.
            successor = NIL;

            let mut t = self.tail();
            while t != NIL && t != index {
                if self.node(t).status() <= 0 {
                    successor = t;
                }
                t = self.node(t).prev();
            }
        }

        if successor != NIL {
            self.node(successor).unpark();
        }
    }

    /// Decides whether `index` may park after a failed acquire.
    ///
    /// Parking is allowed only once `pred` carries SIGNAL, so a release that
    /// happens after we looked at the state still finds us. Cancelled
    /// predecessors are skipped along the way.
    pub(crate) fn should_park_after_failed_acquire(&self, pred: u32, index: u32) -> bool {
        let node = self.node(index);
        let ws = self.node(pred).status();

        if ws == status::SIGNAL {
            return true;
        }

        if ws > 0 {
            let mut pred = pred;
            loop {
                let before = self.node(pred).prev();
                if before == NIL {
                    break;
                }

                pred = before;
                node.set_prev(pred);

                if self.node(pred).status() <= 0 {
                    break;
                }
            }
            self.node(pred).set_next(index);
        } else {
            self.node(pred).cas_status(ws, status::SIGNAL);
        }

        false
    }

    /// Cancels an in-progress acquisition.
    pub(crate) fn cancel_acquire(&self, index: u32) {
        let node = self.node(index);
        node.clear_thread();

        let mut pred = node.prev();
        while pred != NIL && self.node(pred).status() > 0 {
            pred = self.node(pred).prev();
            node.set_prev(pred);
        }

        if pred == NIL {
            // Only possible for a node that already became head.
            return;
        }

        let pred_node = self.node(pred);
        let pred_next = pred_node.next();

        node.set_status(status::CANCELLED);
        trace!(node = index, "cancelled waiter");

        if index == self.tail()
            && self
                .tail
                .compare_exchange(index, pred, SeqCst, SeqCst)
                .is_ok()
        {
            // Unreachable from the queue roots now; only sections that read
            // the old tail can still see it.
            pred_node.cas_next(pred_next, NIL);
            self.retire(index);
            return;
        }

        let ws = pred_node.status();
        let pred_signals = ws == status::SIGNAL
            || (ws <= 0 && pred_node.cas_status(ws, status::SIGNAL));

        if pred != self.head() && pred_signals && pred_node.has_thread() {
            let next = node.next();
            if next != NIL && next != index && self.node(next).status() <= 0 {
                pred_node.cas_next(pred_next, next);
            }
        } else {
            self.unpark_successor(index);
        }

        node.set_next(index);

        self.retire_cancelled(index);
    }

    /// Wake-and-propagate loop used by shared releases.
    pub(crate) fn do_release_shared(&self) {
        loop {
            let h = self.head();

            if h != self.tail() {
                let head = self.node(h);
                let ws = head.status();

                if ws == status::SIGNAL {
                    if !head.cas_status(status::SIGNAL, status::INITIAL) {
                        continue;
                    }
                    self.unpark_successor(h);
                } else if ws == status::INITIAL
                    && !head.cas_status(status::INITIAL, status::PROPAGATE)
                {
                    continue;
                }
            }

            if h == self.head() {
                break;
            }
        }
    }

    /// Returns `true` once a condition node has been moved onto the sync queue.
    pub(crate) fn is_on_sync_queue(&self, index: u32) -> bool {
        let node = self.node(index);

        if node.status() == status::CONDITION || node.prev() == NIL {
            return false;
        }
        if node.next() != NIL {
            return true;
        }

        // prev is set before the tail CAS, so the node may still be racing in.
        let mut t = self.tail();
        loop {
            if t == index {
                return true;
            }
            if t == NIL {
                return false;
            }
            t = self.node(t).prev();
        }
    }

    /// Moves a signalled condition node onto the sync queue.
    ///
    /// Returns `false` if the node was cancelled before the signal. The
    /// waiting thread is woken directly only when its new predecessor cannot
    /// be relied on to do it.
    pub(crate) fn transfer_for_signal(&self, index: u32) -> bool {
        let node = self.node(index);

        if !node.cas_status(status::CONDITION, status::INITIAL) {
            return false;
        }

        let pred = self.enq(index);
        let ws = self.node(pred).status();
        trace!(node = index, pred, "transferred condition waiter");

        if ws > 0 || !self.node(pred).cas_status(ws, status::SIGNAL) {
            node.unpark();
        }

        true
    }

    /// Moves a condition node onto the sync queue after a timeout or interrupt.
    ///
    /// Returns `true` if the cancellation won, `false` if a signal got there first.
    pub(crate) fn transfer_after_cancelled_wait(&self, index: u32) -> bool {
        if self
            .node(index)
            .cas_status(status::CONDITION, status::INITIAL)
        {
            self.enq(index);
            return true;
        }

        // A signaller is in the middle of enq; it cannot fail from here.
        while !self.is_on_sync_queue(index) {
            std::thread::yield_now();
        }

        false
    }

    /// Returns `true` if a node behind the head is not cancelled.
    pub(crate) fn has_queued_threads(&self) -> bool {
        if self.head() == self.tail() {
            return false;
        }

        let _cs = self.enter();
        let head = self.head();
        let mut t = self.tail();

        while t != NIL && t != head {
            if self.node(t).status() <= 0 {
                return true;
            }
            t = self.node(t).prev();
        }

        false
    }

    pub(crate) fn queue_length(&self) -> usize {
        let _cs = self.enter();
        let mut count = 0;
        let mut t = self.tail();
        let head = self.head();

        while t != NIL && t != head {
            if self.node(t).has_thread() {
                count += 1;
            }
            t = self.node(t).prev();
        }

        count
    }

    pub(crate) fn first_queued_is_exclusive(&self) -> bool {
        let _cs = self.enter();
        let next = self.node(self.head()).next();

        next != NIL && !self.node(next).is_shared() && self.node(next).has_thread()
    }
}

