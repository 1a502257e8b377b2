//! Pseudo-terminal entry points.
//!
//! `ptsname` itself is not exported: its static buffer cannot be made
//! thread-safe, so only the reentrant `ptsname_r` is.

use crate::sys::Kernel;
use crate::{Errno, Shim, host};
use macros::shim_symbol;
use std::os::raw::{c_char, c_int};

/// Open a new pseudo-terminal master. `flags` must include `O_RDWR`.
#[shim_symbol]
pub fn posix_openpt(flags: c_int) -> c_int {
    match host().posix_openpt(flags) {
        Ok(fd) => fd,
        Err(e) => super::fail(e),
    }
}

#[shim_symbol]
pub fn grantpt(fd: c_int) -> c_int {
    match host().grantpt(fd) {
        Ok(()) => 0,
        Err(e) => super::fail(e),
    }
}

#[shim_symbol]
pub fn unlockpt(fd: c_int) -> c_int {
    match host().unlockpt(fd) {
        Ok(()) => 0,
        Err(e) => super::fail(e),
    }
}

/// Copy the slave path of `fd` into `buf`.
///
/// Returns 0 on success or an error number, which is also stored in
/// `errno`. `ERANGE` means `buf` cannot hold the path and its terminator.
#[shim_symbol("ptsname_r")]
pub fn ptsname_into(fd: c_int, buf: *mut c_char, buflen: libc::size_t) -> c_int {
    ptsname_on(host(), fd, buf, buflen)
}

/// [`ptsname_into`] against `shim`. An unaddressable `buf` fails before
/// the kernel is asked for the name.
pub fn ptsname_on<K: Kernel>(
    shim: &Shim<K>,
    fd: c_int,
    buf: *mut c_char,
    buflen: libc::size_t,
) -> c_int {
    if !shim.address_check().is_valid(buf as *const u8, buflen) || buf.is_null() {
        super::set_errno(Errno::EFAULT);
        return libc::EFAULT;
    }
    let name = match shim.ptsname(fd) {
        Ok(name) => name,
        Err(e) => {
            super::set_errno(e.errno());
            return e.errno().0;
        }
    };
    let bytes = name.as_bytes();
    if bytes.len() >= buflen {
        super::set_errno(Errno::ERANGE);
        return libc::ERANGE;
    }
    // SAFETY: buf holds at least buflen bytes, checked above.
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf.cast::<u8>(), bytes.len());
        *buf.add(bytes.len()) = 0;
    }
    0
}
