//! Descriptor wait entry points.

use crate::sys::{Kernel, PollFd, SigSet};
use crate::time::Timespec;
use crate::{Error, Shim, host};
use macros::shim_symbol;
use std::fmt::Write;
use std::os::raw::c_int;

/// Wait for events on `nfds` descriptors with `sigmask` installed for the
/// duration.
///
/// A null `timeout` blocks indefinitely; a null `sigmask` leaves the mask
/// alone. The caller's timeout is never written to.
#[shim_symbol]
pub fn ppoll(
    fds: *mut libc::pollfd,
    nfds: libc::nfds_t,
    timeout: *const libc::timespec,
    sigmask: *const libc::sigset_t,
) -> c_int {
    ppoll_on(host(), fds, nfds, timeout, sigmask)
}

/// [`ppoll`] against `shim`: every pointer is checked with the shim's
/// address check before anything reaches its kernel.
pub fn ppoll_on<K: Kernel>(
    shim: &Shim<K>,
    fds: *mut libc::pollfd,
    nfds: libc::nfds_t,
    timeout: *const libc::timespec,
    sigmask: *const libc::sigset_t,
) -> c_int {
    let check = shim.address_check();
    let len = nfds as usize;
    let valid = len
        .checked_mul(size_of::<PollFd>())
        .is_some_and(|bytes| check.is_valid(fds as *const u8, bytes))
        && (timeout.is_null() || check.is_valid(timeout as *const u8, size_of::<libc::timespec>()))
        && (sigmask.is_null() || check.is_valid(sigmask as *const u8, size_of::<libc::sigset_t>()));
    if !valid {
        shim.strace().emit(|l| {
            write!(
                l,
                "ppoll({:p}, {}, {:p}, {:p}) → -1 EFAULT",
                fds, len, timeout, sigmask
            )
        });
        return super::fail(Error::Fault);
    }

    let fds: &mut [PollFd] = if len == 0 {
        &mut []
    } else {
        // SAFETY: the range was checked above and PollFd is layout-identical
        // to struct pollfd.
        unsafe { std::slice::from_raw_parts_mut(fds.cast::<PollFd>(), len) }
    };
    // SAFETY: non-null pointers were checked above.
    let timeout = unsafe { timeout.as_ref() }.map(Timespec::from_libc);
    let sigmask = unsafe { sigmask.as_ref() }.map(SigSet::from_libc);

    super::ret(shim.ppoll(fds, timeout.as_ref(), sigmask.as_ref()))
}

/// Wait for events on `nfds` descriptors for up to `timeout` milliseconds.
#[shim_symbol]
pub fn poll(fds: *mut libc::pollfd, nfds: libc::nfds_t, timeout: c_int) -> c_int {
    poll_on(host(), fds, nfds, timeout)
}

pub fn poll_on<K: Kernel>(
    shim: &Shim<K>,
    fds: *mut libc::pollfd,
    nfds: libc::nfds_t,
    timeout: c_int,
) -> c_int {
    let len = nfds as usize;
    let valid = len
        .checked_mul(size_of::<PollFd>())
        .is_some_and(|bytes| shim.address_check().is_valid(fds as *const u8, bytes));
    if !valid {
        shim.strace()
            .emit(|l| write!(l, "poll({:p}, {}, {}) → -1 EFAULT", fds, len, timeout));
        return super::fail(Error::Fault);
    }
    let fds: &mut [PollFd] = if len == 0 {
        &mut []
    } else {
        // SAFETY: checked above.
        unsafe { std::slice::from_raw_parts_mut(fds.cast::<PollFd>(), len) }
    };
    super::ret(shim.poll(fds, timeout))
}
