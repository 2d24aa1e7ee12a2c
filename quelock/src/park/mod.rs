//! Platform-specific thread parking.
//!
//! This module is the only place where a thread actually gives up the
//! processor. The synchronizer needs two things from the platform:
//!
//! - block the current thread until it is signaled, optionally with a deadline,
//! - wake one specific blocked thread.
//!
//! Each thread owns a [`Parker`] holding a single wake token, so an unpark
//! delivered before the matching park is never lost.
//!
//! The concrete implementation is selected at compile time:
//! - Linux and Android wait on a futex word,
//! - Windows waits on the same word with `WaitOnAddress`,
//! - every other target falls back to a mutex and condition variable.

#[cfg(any(target_os = "linux", target_os = "android"))]
mod futex;

#[cfg(any(target_os = "linux", target_os = "android"))]
use futex as sys;

#[cfg(windows)]
mod windows;

#[cfg(windows)]
use windows as sys;

#[cfg(any(target_os = "linux", target_os = "android", windows))]
mod word;

#[cfg(any(target_os = "linux", target_os = "android", windows))]
pub(crate) use word::Parker;

#[cfg(not(any(target_os = "linux", target_os = "android", windows)))]
mod condvar;

#[cfg(not(any(target_os = "linux", target_os = "android", windows)))]
pub(crate) use condvar::Parker;
