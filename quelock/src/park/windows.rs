//! Windows `WaitOnAddress` backend.
//!
//! Mirrors the futex backend: the parker word is waited on directly and
//! woken with `WakeByAddressSingle`.

use std::mem;
use std::sync::atomic::AtomicU32;
use std::time::Duration;

use windows_sys::Win32::System::Threading::{INFINITE, WaitOnAddress, WakeByAddressSingle};

/// Blocks while `*word == expected`, at most for `timeout`.
pub(super) fn wait(word: &AtomicU32, expected: u32, timeout: Option<Duration>) {
    let millis = match timeout {
        // Round up so a short timeout does not turn into a busy loop.
        Some(timeout) => timeout
            .as_nanos()
            .div_ceil(1_000_000)
            .min(u128::from(INFINITE - 1)) as u32,
        None => INFINITE,
    };

    unsafe {
        WaitOnAddress(
            word.as_ptr().cast(),
            (&expected as *const u32).cast(),
            mem::size_of::<u32>(),
            millis,
        );
    }
}

/// Wakes one thread blocked on `word`.
pub(super) fn wake_one(word: &AtomicU32) {
    unsafe {
        WakeByAddressSingle(word.as_ptr().cast());
    }
}
