//! C ABI entry points.
//!
//! These functions expose the dispatcher with the classic C calling
//! convention: a non-negative result on success, `-1` with `errno` set on
//! failure. Each one is exported as `shim_<name>` and registered under its
//! POSIX name in [`crate::symbols`].
//!
//! Every pointer a caller passes in is checked with the host dispatcher's
//! [`crate::memcheck::AddressCheck`] before it is dereferenced; a pointer that
//! fails the check produces `EFAULT` without any kernel call.
//!
//! # Modules
//!
//! * [`poll`] - `ppoll` and `poll`
//! * [`pty`] - `posix_openpt`, `grantpt`, `unlockpt` and `ptsname_r`

use crate::{Errno, Error};
use std::os::raw::c_int;

pub mod poll;
pub mod pty;

#[cfg(any(target_os = "linux", target_os = "emscripten"))]
unsafe fn errno_location() -> *mut c_int {
    unsafe { libc::__errno_location() }
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
unsafe fn errno_location() -> *mut c_int {
    unsafe { libc::__error() }
}

#[cfg(any(target_os = "android", target_os = "openbsd", target_os = "netbsd"))]
unsafe fn errno_location() -> *mut c_int {
    unsafe { libc::__errno() }
}

/// Set the calling thread's `errno`.
pub fn set_errno(errno: Errno) {
    // SAFETY: the errno location is valid thread-local storage for the
    // lifetime of the calling thread.
    unsafe { *errno_location() = errno.0 };
}

/// Report `err` the C way.
fn fail(err: Error) -> c_int {
    set_errno(err.errno());
    -1
}

fn ret(rc: crate::Result<usize>) -> c_int {
    match rc {
        Ok(n) => n as c_int,
        Err(e) => fail(e),
    }
}
