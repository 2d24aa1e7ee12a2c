use crate::sync::core::{Synchronizer, WaitQueue};

use std::thread;
use std::time::Duration;

/// Builder for configuring and creating synchronizers.
///
/// `SyncBuilder` allows tuning the wait queue before a lock is built. It
/// supports pre-sizing the node arena and the threshold under which timed
/// waits spin instead of parking.
///
/// # Examples
///
/// ```rust
/// use quelock::{ExclusiveMutex, SyncBuilder};
/// use std::time::Duration;
///
/// let mutex = ExclusiveMutex::with_builder(
///     SyncBuilder::new()
///         .initial_nodes(64)
///         .spin_threshold(Duration::from_micros(5)),
/// );
/// assert!(!mutex.is_locked());
/// ```
#[derive(Debug, Clone)]
pub struct SyncBuilder {
    /// Node slots allocated up front, including the dummy head.
    initial_nodes: usize,

    /// Timed waits with less time left than this spin.
    spin_threshold: Duration,
}

impl SyncBuilder {
    /// Creates a new `SyncBuilder` with default configuration.
    ///
    /// By default the arena holds one node per logical CPU plus the dummy
    /// head, and the spin threshold is one microsecond.
    pub fn new() -> Self {
        let initial_nodes = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            + 1;

        Self {
            initial_nodes,
            spin_threshold: Duration::from_micros(1),
        }
    }

    /// Sets the number of node slots allocated when the queue is built.
    ///
    /// The arena still grows on demand; this only avoids early growth.
    ///
    /// # Panics
    ///
    /// Panics if `n == 0`.
    pub fn initial_nodes(mut self, n: usize) -> Self {
        assert!(n > 0, "initial_nodes must be > 0");

        self.initial_nodes = n;
        self
    }

    /// Sets the remaining-time threshold under which timed waits spin.
    pub fn spin_threshold(mut self, threshold: Duration) -> Self {
        self.spin_threshold = threshold;
        self
    }

    /// Builds a synchronizer over `policy` with the given initial state.
    pub fn build<P>(self, policy: P, state: i64) -> Synchronizer<P> {
        let queue = WaitQueue::new(self.initial_nodes, self.spin_threshold);
        Synchronizer::from_parts(policy, state, queue)
    }
}

impl Default for SyncBuilder {
    fn default() -> Self {
        Self::new()
    }
}
