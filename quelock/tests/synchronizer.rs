mod common;

use common::{init_test_logging, wait_until};
use quelock::{Error, ExclusivePolicy, Result, SharedPolicy, SyncBuilder, Synchronizer};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// A one-shot gate: acquirers pass once the count reaches zero.
#[derive(Debug)]
struct Latch;

impl SharedPolicy for Latch {
    fn try_acquire_shared(&self, sync: &Synchronizer<Self>, _arg: i64) -> i64 {
        if sync.state().get() == 0 { 1 } else { -1 }
    }

    fn try_release_shared(&self, sync: &Synchronizer<Self>, _arg: i64) -> Result<bool> {
        loop {
            let count = sync.state().get();
            if count == 0 {
                return Ok(false);
            }
            if sync.state().compare_and_set(count, count - 1) {
                return Ok(count == 1);
            }
        }
    }
}

/// A binary semaphore: no owner, any thread may release.
#[derive(Debug)]
struct Binary;

impl ExclusivePolicy for Binary {
    fn try_acquire(&self, sync: &Synchronizer<Self>, _arg: i64) -> bool {
        sync.state().compare_and_set(0, 1)
    }

    fn try_release(&self, sync: &Synchronizer<Self>, _arg: i64) -> Result<bool> {
        if sync.state().compare_and_set(1, 0) {
            Ok(true)
        } else {
            Err(Error::IllegalState("semaphore is not taken"))
        }
    }

    fn is_held_exclusively(&self, sync: &Synchronizer<Self>) -> bool {
        sync.state().get() == 1
    }
}

#[test]
fn test_latch_releases_all_shared_waiters() {
    init_test_logging();

    const WAITERS: usize = 5;

    let latch = Synchronizer::new(Latch, 3);
    let passed = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..WAITERS {
            s.spawn(|| {
                latch.acquire_shared(1);
                passed.fetch_add(1, Ordering::SeqCst);
            });
        }

        wait_until("every waiter to queue", || latch.queue_length() == WAITERS);
        assert_eq!(passed.load(Ordering::SeqCst), 0);

        assert_eq!(latch.release_shared(1), Ok(false));
        assert_eq!(latch.release_shared(1), Ok(false));
        assert_eq!(latch.release_shared(1), Ok(true));
    });

    assert_eq!(passed.load(Ordering::SeqCst), WAITERS);
    assert!(latch.try_acquire_shared(1) >= 0);
}

#[test]
fn test_shared_timed_acquire_times_out() {
    let latch = Synchronizer::new(Latch, 1);

    assert_eq!(
        latch.try_acquire_shared_for(1, Duration::from_millis(30)),
        Ok(false)
    );
    assert_eq!(latch.try_acquire_shared_for(1, Duration::ZERO), Ok(false));
    assert!(!latch.has_queued_threads());

    latch.release_shared(1).unwrap();
    assert_eq!(latch.try_acquire_shared_for(1, Duration::ZERO), Ok(true));
}

#[test]
fn test_shared_interruptible_acquire() {
    let latch = Synchronizer::new(Latch, 1);

    thread::scope(|s| {
        let (tx, rx) = mpsc::channel();
        let latch = &latch;

        let waiter = s.spawn(move || {
            tx.send(quelock::thread::current()).unwrap();
            latch.acquire_shared_interruptibly(1)
        });

        let handle = rx.recv().unwrap();
        wait_until("waiter to queue", || latch.queue_length() == 1);
        handle.interrupt();

        assert_eq!(waiter.join().unwrap(), Err(Error::Interrupted));
    });

    assert!(!latch.has_queued_threads());
}

#[test]
fn test_binary_released_by_other_thread() {
    let semaphore = Synchronizer::new(Binary, 0);

    assert!(semaphore.try_acquire(1));
    assert!(semaphore.is_held_exclusively());
    assert!(!semaphore.try_acquire(1));

    thread::scope(|s| {
        s.spawn(|| {
            assert_eq!(semaphore.release(1), Ok(true));
        });
    });

    assert!(matches!(semaphore.release(1), Err(Error::IllegalState(_))));
    assert_eq!(semaphore.try_acquire_for(1, Duration::from_millis(10)), Ok(true));
}

#[test]
fn test_first_queued_is_exclusive() {
    let semaphore = Synchronizer::new(Binary, 1);
    assert!(!semaphore.first_queued_is_exclusive());

    thread::scope(|s| {
        let waiter = s.spawn(|| semaphore.acquire(1));

        wait_until("waiter to queue", || semaphore.first_queued_is_exclusive());
        assert_eq!(semaphore.queue_length(), 1);

        semaphore.release(1).unwrap();
        waiter.join().unwrap();
    });

    assert_eq!(semaphore.state().get(), 1);
    assert!(!semaphore.first_queued_is_exclusive());
}

#[test]
fn test_nodes_are_recycled_under_churn() {
    init_test_logging();

    const THREADS: usize = 8;
    const ITERATIONS: usize = 3_000;

    let sync = SyncBuilder::new()
        .initial_nodes(4)
        .spin_threshold(Duration::from_micros(2))
        .build(Binary, 0);

    thread::scope(|s| {
        for t in 0..THREADS {
            let sync = &sync;
            s.spawn(move || {
                for i in 0..ITERATIONS {
                    let acquired = if (i + t) % 3 == 0 {
                        sync.try_acquire_for(1, Duration::from_micros(50)).unwrap()
                    } else {
                        sync.acquire(1);
                        true
                    };

                    if acquired {
                        sync.release(1).unwrap();
                    }
                }
            });
        }
    });

    // Any critical section that closes at a quiescent point drains retired nodes.
    assert_eq!(sync.queue_length(), 0);

    let attempts = THREADS * ITERATIONS;
    assert!(
        sync.node_capacity() < attempts / 2,
        "arena grew to {} slots",
        sync.node_capacity()
    );
    assert!(
        sync.nodes_in_use() <= 1 + 8 * THREADS,
        "{} nodes still in use",
        sync.nodes_in_use()
    );
}

#[test]
fn test_timed_out_tail_nodes_are_recycled() {
    init_test_logging();

    let semaphore = Synchronizer::new(Binary, 1);
    let capacity = semaphore.node_capacity();

    for _ in 0..2_000 {
        assert_eq!(
            semaphore.try_acquire_for(1, Duration::from_micros(20)),
            Ok(false)
        );
    }

    // Only the fast path from here on; the head never moves.
    semaphore.release(1).unwrap();
    for _ in 0..100 {
        assert!(semaphore.try_acquire(1));
        semaphore.release(1).unwrap();
    }

    assert_eq!(semaphore.queue_length(), 0);
    assert!(!semaphore.has_queued_threads());
    assert!(
        semaphore.nodes_in_use() <= 2,
        "{} nodes still in use",
        semaphore.nodes_in_use()
    );
    assert_eq!(semaphore.node_capacity(), capacity);
}

#[test]
fn test_has_queued_threads_skips_cancelled_nodes() {
    init_test_logging();

    let semaphore = Synchronizer::new(Binary, 1);

    thread::scope(|s| {
        let (tx, rx) = mpsc::channel();
        let semaphore = &semaphore;

        let first = {
            let tx = tx.clone();
            s.spawn(move || {
                tx.send(quelock::thread::current()).unwrap();
                semaphore.acquire_interruptibly(1)
            })
        };
        let first_handle = rx.recv().unwrap();
        wait_until("first waiter to queue", || semaphore.queue_length() == 1);

        let second = s.spawn(move || {
            tx.send(quelock::thread::current()).unwrap();
            semaphore.acquire_interruptibly(1)
        });
        let second_handle = rx.recv().unwrap();
        wait_until("second waiter to queue", || semaphore.queue_length() == 2);

        // The first node is cancelled in the middle of the queue and stays linked.
        first_handle.interrupt();
        assert_eq!(first.join().unwrap(), Err(Error::Interrupted));
        assert!(semaphore.has_queued_threads());
        assert_eq!(semaphore.queue_length(), 1);

        second_handle.interrupt();
        assert_eq!(second.join().unwrap(), Err(Error::Interrupted));
        assert!(!semaphore.has_queued_threads());
    });

    assert_eq!(semaphore.queue_length(), 0);
    assert_eq!(semaphore.state().get(), 1);
}
