//! BSD-specific kernel entry points.

use super::{PollFd, SigSet, SysResult};
use crate::{Errno, time::Timespec};
use std::ffi::CStr;
use std::os::raw::c_int;

#[cfg(target_os = "freebsd")]
pub fn ppoll(
    fds: &mut [PollFd],
    timeout: Option<&Timespec>,
    sigmask: Option<&SigSet>,
) -> SysResult<usize> {
    let ts = timeout.map(|t| t.to_libc());
    let mask = sigmask.map(|m| m.to_libc());
    let tsp = ts
        .as_ref()
        .map_or(std::ptr::null(), |t| t as *const libc::timespec);
    let maskp = mask
        .as_ref()
        .map_or(std::ptr::null(), |m| m as *const libc::sigset_t);
    let rc = unsafe {
        libc::ppoll(
            fds.as_mut_ptr().cast::<libc::pollfd>(),
            fds.len() as libc::nfds_t,
            tsp,
            maskp,
        )
    };
    if rc < 0 {
        return Err(Errno::last());
    }
    Ok(rc as usize)
}

/// NetBSD spells it `pollts` and OpenBSD's binding is not exposed, so both
/// take the sequenced path.
#[cfg(not(target_os = "freebsd"))]
pub fn ppoll(
    _fds: &mut [PollFd],
    _timeout: Option<&Timespec>,
    _sigmask: Option<&SigSet>,
) -> SysResult<usize> {
    Err(Errno::ENOSYS)
}

#[cfg(target_os = "freebsd")]
pub fn posix_openpt(flags: c_int) -> SysResult<c_int> {
    let fd = unsafe { libc::posix_openpt(flags) };
    if fd < 0 {
        return Err(Errno::last());
    }
    Ok(fd)
}

#[cfg(not(target_os = "freebsd"))]
pub fn posix_openpt(_flags: c_int) -> SysResult<c_int> {
    Err(Errno::ENOSYS)
}

pub fn ptsname(fd: c_int) -> SysResult<String> {
    let name = unsafe { libc::ptsname(fd) };
    if name.is_null() {
        return Err(Errno::last());
    }
    let name = unsafe { CStr::from_ptr(name) };
    Ok(name.to_string_lossy().into_owned())
}

pub fn gettid() -> u64 {
    unsafe { libc::pthread_self() as usize as u64 }
}
