mod common;

use common::{init_test_logging, wait_until};
use quelock::{Error, Lock, RwLock};

use std::sync::Barrier;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

#[test]
fn test_rwlock_readers_share() {
    init_test_logging();

    const READERS: usize = 4;

    let lock = RwLock::new();
    let barrier = Barrier::new(READERS);

    thread::scope(|s| {
        for _ in 0..READERS {
            s.spawn(|| {
                let read = lock.read_lock();
                read.lock();
                // Every reader is inside at once, or this never returns.
                barrier.wait();
                read.unlock().unwrap();
            });
        }
    });

    assert_eq!(lock.read_lock_count(), 0);
}

#[test]
fn test_rwlock_writer_excludes_everyone() {
    let lock = RwLock::new();
    let read = lock.read_lock();
    let write = lock.write_lock();

    write.lock();
    assert!(lock.is_write_locked());
    assert!(write.is_held_by_current_thread());

    thread::scope(|s| {
        s.spawn(|| {
            assert!(!read.try_lock());
            assert!(!write.try_lock());
            assert!(!lock.is_write_locked_by_current_thread());
        });
    });

    write.unlock().unwrap();

    read.lock();
    assert!(!write.try_lock());
    read.unlock().unwrap();
    assert!(write.try_lock());
    write.unlock().unwrap();
}

#[test]
fn test_rwlock_queued_writer_blocks_new_readers() {
    init_test_logging();

    let lock = RwLock::new();
    let read = lock.read_lock();
    let written = AtomicBool::new(false);

    read.lock();

    thread::scope(|s| {
        let writer = s.spawn(|| {
            let write = lock.write_lock();
            write.lock();
            written.store(true, Ordering::SeqCst);
            write.unlock().unwrap();
        });

        wait_until("writer to queue", || lock.queue_length() == 1);
        thread::sleep(Duration::from_millis(20));

        s.spawn(|| {
            assert!(!lock.read_lock().try_lock());
        })
        .join()
        .unwrap();

        read.unlock().unwrap();
        writer.join().unwrap();
    });

    assert!(written.load(Ordering::SeqCst));
    assert!(read.try_lock());
    read.unlock().unwrap();
}

#[test]
fn test_rwlock_unlock_without_hold() {
    let lock = RwLock::new();

    assert!(matches!(
        lock.read_lock().unlock(),
        Err(Error::IllegalState(_))
    ));
    assert!(matches!(
        lock.write_lock().unlock(),
        Err(Error::IllegalState(_))
    ));

    lock.read_lock().lock();
    assert!(matches!(
        lock.write_lock().unlock(),
        Err(Error::IllegalState(_))
    ));
    lock.read_lock().unlock().unwrap();
}

#[test]
fn test_rwlock_timed_write_times_out() {
    let lock = RwLock::new();
    let read = lock.read_lock();
    read.lock();

    thread::scope(|s| {
        s.spawn(|| {
            let write = lock.write_lock();
            assert_eq!(write.try_lock_for(Duration::from_millis(50)), Ok(false));
        });
    });

    // The cancelled writer no longer holds readers back.
    assert!(read.try_lock());
    read.unlock().unwrap();
    read.unlock().unwrap();
    assert!(!lock.has_queued_threads());
}

#[test]
fn test_rwlock_mixed_stress() {
    init_test_logging();

    const THREADS: usize = 8;
    const ITERATIONS: usize = 1_000;

    let lock = RwLock::new();
    let readers = AtomicUsize::new(0);
    let writers = AtomicUsize::new(0);

    thread::scope(|s| {
        for t in 0..THREADS {
            let lock = &lock;
            let readers = &readers;
            let writers = &writers;

            s.spawn(move || {
                let read = lock.read_lock();
                let write = lock.write_lock();

                for i in 0..ITERATIONS {
                    if (i + t) % 4 == 0 {
                        let _guard = write.guard();
                        assert_eq!(writers.fetch_add(1, Ordering::SeqCst), 0);
                        assert_eq!(readers.load(Ordering::SeqCst), 0);
                        writers.fetch_sub(1, Ordering::SeqCst);
                    } else {
                        let _guard = read.guard();
                        readers.fetch_add(1, Ordering::SeqCst);
                        assert_eq!(writers.load(Ordering::SeqCst), 0);
                        readers.fetch_sub(1, Ordering::SeqCst);
                    }
                }
            });
        }
    });

    assert_eq!(lock.read_lock_count(), 0);
    assert!(!lock.is_write_locked());
}
