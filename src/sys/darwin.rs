//! XNU-specific kernel entry points.

use super::{PollFd, SigSet, SysResult};
use crate::{Errno, time::Timespec};
use std::ffi::CStr;
use std::os::raw::c_int;

/// XNU has no `ppoll`; the dispatcher sequences the mask swap itself.
pub fn ppoll(
    _fds: &mut [PollFd],
    _timeout: Option<&Timespec>,
    _sigmask: Option<&SigSet>,
) -> SysResult<usize> {
    Err(Errno::ENOSYS)
}

pub fn posix_openpt(_flags: c_int) -> SysResult<c_int> {
    Err(Errno::ENOSYS)
}

pub fn ptsname(fd: c_int) -> SysResult<String> {
    // XNU's ptsname returns a per-thread buffer; copy out before anything else
    // can overwrite it.
    let name = unsafe { libc::ptsname(fd) };
    if name.is_null() {
        return Err(Errno::last());
    }
    let name = unsafe { CStr::from_ptr(name) };
    Ok(name.to_string_lossy().into_owned())
}

pub fn gettid() -> u64 {
    let mut tid: u64 = 0;
    unsafe {
        libc::pthread_threadid_np(0 as libc::pthread_t, &mut tid);
    }
    tid
}
