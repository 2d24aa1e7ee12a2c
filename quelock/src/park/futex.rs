//! Linux / Android `futex` backend.
//!
//! Errors from the syscall (`EINTR`, `EAGAIN`, `ETIMEDOUT`) are ignored;
//! the parker re-reads the word after every return.

use std::mem;
use std::ptr;
use std::sync::atomic::AtomicU32;
use std::time::Duration;

/// Blocks while `*word == expected`, at most for `timeout`.
pub(super) fn wait(word: &AtomicU32, expected: u32, timeout: Option<Duration>) {
    let ts = timeout.map(|timeout| {
        let mut ts: libc::timespec = unsafe { mem::zeroed() };
        ts.tv_sec = timeout.as_secs().min(libc::time_t::MAX as u64) as libc::time_t;
        ts.tv_nsec = timeout.subsec_nanos() as _;
        ts
    });

    let ts_ptr = ts
        .as_ref()
        .map_or(ptr::null(), |ts| ts as *const libc::timespec);

    unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
            expected,
            ts_ptr,
        );
    }
}

/// Wakes one thread blocked on `word`.
pub(super) fn wake_one(word: &AtomicU32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
            1,
        );
    }
}
