mod common;

use common::{init_test_logging, wait_until};
use quelock::{Error, ExclusiveMutex, Lock, RwLock};

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_condition_wait_releases_and_reacquires() {
    init_test_logging();

    let mutex = ExclusiveMutex::new();
    let ready = mutex.new_condition();
    let flag = AtomicBool::new(false);

    thread::scope(|s| {
        let waiter = s.spawn(|| {
            mutex.lock();
            while !flag.load(Ordering::SeqCst) {
                ready.wait().unwrap();
                assert!(mutex.is_held_by_current_thread());
            }
            mutex.unlock().unwrap();
        });

        wait_until("waiter to block on the condition", || {
            mutex.lock();
            let waiting = ready.has_waiters().unwrap();
            mutex.unlock().unwrap();
            waiting
        });

        // The waiter released the lock while waiting.
        mutex.lock();
        flag.store(true, Ordering::SeqCst);
        ready.signal().unwrap();
        assert!(!ready.has_waiters().unwrap());
        mutex.unlock().unwrap();

        waiter.join().unwrap();
    });

    assert!(!mutex.is_locked());
}

#[test]
fn test_condition_requires_lock() {
    init_test_logging();

    let mutex = ExclusiveMutex::new();
    let condition = mutex.new_condition();

    assert!(matches!(condition.signal(), Err(Error::IllegalState(_))));
    assert!(matches!(condition.signal_all(), Err(Error::IllegalState(_))));
    assert!(matches!(condition.wait(), Err(Error::IllegalState(_))));
    assert!(matches!(
        condition.wait_timeout(Duration::from_millis(1)),
        Err(Error::IllegalState(_))
    ));
    assert!(matches!(condition.has_waiters(), Err(Error::IllegalState(_))));

    thread::scope(|s| {
        mutex.lock();
        s.spawn(|| {
            assert!(matches!(condition.signal(), Err(Error::IllegalState(_))));
        })
        .join()
        .unwrap();
        mutex.unlock().unwrap();
    });
}

#[test]
fn test_condition_signal_all_wakes_everyone() {
    const WAITERS: usize = 6;

    let mutex = ExclusiveMutex::new();
    let go = mutex.new_condition();
    let open = AtomicBool::new(false);
    let woken = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..WAITERS {
            s.spawn(|| {
                mutex.lock();
                while !open.load(Ordering::SeqCst) {
                    go.wait().unwrap();
                }
                woken.fetch_add(1, Ordering::SeqCst);
                mutex.unlock().unwrap();
            });
        }

        wait_until("every waiter to block", || {
            mutex.lock();
            let waiting = go.wait_queue_length().unwrap();
            mutex.unlock().unwrap();
            waiting == WAITERS
        });

        mutex.lock();
        open.store(true, Ordering::SeqCst);
        go.signal_all().unwrap();
        assert_eq!(go.wait_queue_length().unwrap(), 0);
        mutex.unlock().unwrap();
    });

    assert_eq!(woken.load(Ordering::SeqCst), WAITERS);
}

#[test]
fn test_condition_signal_wakes_one() {
    let mutex = ExclusiveMutex::new();
    let condition = mutex.new_condition();
    let tickets = AtomicUsize::new(0);
    let served = AtomicUsize::new(0);

    thread::scope(|s| {
        for _ in 0..2 {
            s.spawn(|| {
                mutex.lock();
                while tickets.load(Ordering::SeqCst) == 0 {
                    condition.wait().unwrap();
                }
                tickets.fetch_sub(1, Ordering::SeqCst);
                served.fetch_add(1, Ordering::SeqCst);
                mutex.unlock().unwrap();
            });
        }

        wait_until("both waiters to block", || {
            mutex.lock();
            let waiting = condition.wait_queue_length().unwrap();
            mutex.unlock().unwrap();
            waiting == 2
        });

        mutex.lock();
        tickets.fetch_add(1, Ordering::SeqCst);
        condition.signal().unwrap();
        assert_eq!(condition.wait_queue_length().unwrap(), 1);
        mutex.unlock().unwrap();

        wait_until("first waiter to be served", || {
            served.load(Ordering::SeqCst) == 1
        });

        mutex.lock();
        tickets.fetch_add(1, Ordering::SeqCst);
        condition.signal().unwrap();
        mutex.unlock().unwrap();
    });

    assert_eq!(served.load(Ordering::SeqCst), 2);
}

#[test]
fn test_condition_wait_timeout_expires() {
    let mutex = ExclusiveMutex::new();
    let condition = mutex.new_condition();

    mutex.lock();

    let start = Instant::now();
    let signalled = condition.wait_timeout(Duration::from_millis(50)).unwrap();
    let elapsed = start.elapsed();

    assert!(!signalled);
    assert!(elapsed >= Duration::from_millis(45), "returned after {elapsed:?}");
    assert!(mutex.is_held_by_current_thread());
    assert!(!condition.has_waiters().unwrap());

    mutex.unlock().unwrap();
}

#[test]
fn test_condition_wait_timeout_signalled() {
    let mutex = ExclusiveMutex::new();
    let condition = mutex.new_condition();

    thread::scope(|s| {
        let waiter = s.spawn(|| {
            mutex.lock();
            let signalled = condition.wait_timeout(Duration::from_secs(10)).unwrap();
            assert!(mutex.is_held_by_current_thread());
            mutex.unlock().unwrap();
            signalled
        });

        wait_until("waiter to block", || {
            mutex.lock();
            let waiting = condition.has_waiters().unwrap();
            mutex.unlock().unwrap();
            waiting
        });

        mutex.lock();
        condition.signal().unwrap();
        mutex.unlock().unwrap();

        assert!(waiter.join().unwrap());
    });
}

#[test]
fn test_condition_interrupted_wait_reacquires() {
    init_test_logging();

    let mutex = ExclusiveMutex::new();
    let condition = mutex.new_condition();

    thread::scope(|s| {
        let (tx, rx) = mpsc::channel();
        let (mutex, condition) = (&mutex, &condition);

        let waiter = s.spawn(move || {
            tx.send(quelock::thread::current()).unwrap();
            mutex.lock();
            let result = condition.wait();
            let held = mutex.is_held_by_current_thread();
            mutex.unlock().unwrap();
            (result, held)
        });

        let handle = rx.recv().unwrap();
        wait_until("waiter to block", || {
            mutex.lock();
            let waiting = condition.has_waiters().unwrap();
            mutex.unlock().unwrap();
            waiting
        });

        handle.interrupt();

        let (result, held) = waiter.join().unwrap();
        assert_eq!(result, Err(Error::Interrupted));
        assert!(held);
    });

    mutex.lock();
    assert_eq!(condition.wait_queue_length().unwrap(), 0);
    mutex.unlock().unwrap();
}

#[test]
fn test_condition_on_write_lock() {
    let lock = RwLock::new();
    let write = lock.write_lock();
    let changed = write.new_condition();
    let value = AtomicUsize::new(0);

    thread::scope(|s| {
        let waiter = s.spawn(|| {
            write.lock();
            while value.load(Ordering::SeqCst) == 0 {
                changed.wait().unwrap();
            }
            assert!(lock.is_write_locked_by_current_thread());
            write.unlock().unwrap();
        });

        wait_until("waiter to block", || {
            write.lock();
            let waiting = changed.has_waiters().unwrap();
            write.unlock().unwrap();
            waiting
        });

        write.lock();
        value.store(7, Ordering::SeqCst);
        changed.signal().unwrap();
        write.unlock().unwrap();

        waiter.join().unwrap();
    });

    assert!(!lock.is_write_locked());
}

#[test]
fn test_condition_wait_uninterruptibly_keeps_waiting() {
    init_test_logging();

    let mutex = ExclusiveMutex::new();
    let condition = mutex.new_condition();

    thread::scope(|s| {
        let (tx, rx) = mpsc::channel();
        let (mutex, condition) = (&mutex, &condition);

        let waiter = s.spawn(move || {
            tx.send(quelock::thread::current()).unwrap();
            mutex.lock();
            let result = condition.wait_uninterruptibly();
            let flagged = quelock::thread::current().is_interrupted();
            mutex.unlock().unwrap();
            (result, flagged)
        });

        let handle = rx.recv().unwrap();
        wait_until("waiter to block", || {
            mutex.lock();
            let waiting = condition.has_waiters().unwrap();
            mutex.unlock().unwrap();
            waiting
        });

        handle.interrupt();
        thread::sleep(Duration::from_millis(30));

        mutex.lock();
        assert!(condition.has_waiters().unwrap());
        condition.signal().unwrap();
        mutex.unlock().unwrap();

        let (result, flagged) = waiter.join().unwrap();
        assert_eq!(result, Ok(()));
        assert!(flagged);
    });
}

#[test]
fn test_condition_interrupt_after_signal_is_reasserted() {
    init_test_logging();

    let mutex = ExclusiveMutex::new();
    let condition = mutex.new_condition();

    thread::scope(|s| {
        let (tx, rx) = mpsc::channel();
        let (mutex, condition) = (&mutex, &condition);

        let waiter = s.spawn(move || {
            tx.send(quelock::thread::current()).unwrap();
            mutex.lock();
            let result = condition.wait();
            let flagged = quelock::thread::current().is_interrupted();
            let held = mutex.is_held_by_current_thread();
            mutex.unlock().unwrap();
            (result, flagged, held)
        });

        let handle = rx.recv().unwrap();
        wait_until("waiter to block", || {
            mutex.lock();
            let waiting = condition.has_waiters().unwrap();
            mutex.unlock().unwrap();
            waiting
        });

        // The waiter is moved to the lock queue before the interrupt lands.
        mutex.lock();
        condition.signal().unwrap();
        handle.interrupt();
        mutex.unlock().unwrap();

        let (result, flagged, held) = waiter.join().unwrap();
        assert_eq!(result, Ok(()));
        assert!(flagged);
        assert!(held);
    });

    mutex.lock();
    assert_eq!(condition.wait_queue_length().unwrap(), 0);
    mutex.unlock().unwrap();
}
