//! Linux-specific kernel entry points.

use super::{PollFd, SigSet, SysResult};
use crate::{Errno, time::Timespec};
use std::ffi::CStr;
use std::os::raw::c_int;

/// Linux has `ppoll` natively. The kernel writes the time left back into
/// the timeout, so it only ever sees a private copy.
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

/// Linux allocates ptys through `/dev/ptmx`, never a dedicated syscall.
pub fn posix_openpt(_flags: c_int) -> SysResult<c_int> {
    Err(Errno::ENOSYS)
}

pub fn ptsname(fd: c_int) -> SysResult<String> {
    let mut buf = [0u8; 128];
    let rc = unsafe { libc::ptsname_r(fd, buf.as_mut_ptr().cast(), buf.len()) };
    if rc != 0 {
        return Err(Errno(rc));
    }
    let name = CStr::from_bytes_until_nul(&buf).map_err(|_| Errno::ERANGE)?;
    Ok(name.to_string_lossy().into_owned())
}

pub fn gettid() -> u64 {
    unsafe { libc::syscall(libc::SYS_gettid) as u64 }
}
