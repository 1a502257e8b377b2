use super::{Kernel, PollFd, RawFd, SigHow, SigSet, SysResult, os};
use crate::{Errno, time::Timespec};
use std::ffi::CStr;
use std::os::raw::c_int;

/// The kernel this process is running on, reached through `libc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostKernel;

impl HostKernel {
    /// Kernel id of the calling thread.
    pub fn gettid() -> u64 {
        os::gettid()
    }
}

fn check(rc: c_int) -> SysResult<c_int> {
    if rc < 0 { Err(Errno::last()) } else { Ok(rc) }
}

impl Kernel for HostKernel {
    fn open(&self, path: &CStr, flags: c_int, mode: u32) -> SysResult<RawFd> {
        check(unsafe { libc::open(path.as_ptr(), flags, mode as libc::c_uint) })
    }

    fn close(&self, fd: RawFd) -> SysResult<()> {
        check(unsafe { libc::close(fd) }).map(|_| ())
    }

    fn posix_openpt(&self, flags: c_int) -> SysResult<RawFd> {
        os::posix_openpt(flags)
    }

    fn grantpt(&self, fd: RawFd) -> SysResult<()> {
        check(unsafe { libc::grantpt(fd) }).map(|_| ())
    }

    fn unlockpt(&self, fd: RawFd) -> SysResult<()> {
        check(unsafe { libc::unlockpt(fd) }).map(|_| ())
    }

    fn ptsname(&self, fd: RawFd) -> SysResult<String> {
        os::ptsname(fd)
    }

    fn ppoll(
        &self,
        fds: &mut [PollFd],
        timeout: Option<&Timespec>,
        sigmask: Option<&SigSet>,
    ) -> SysResult<usize> {
        os::ppoll(fds, timeout, sigmask)
    }

    fn poll(&self, fds: &mut [PollFd], timeout_ms: c_int) -> SysResult<usize> {
        let rc = unsafe {
            libc::poll(
                fds.as_mut_ptr().cast::<libc::pollfd>(),
                fds.len() as libc::nfds_t,
                timeout_ms,
            )
        };
        check(rc).map(|n| n as usize)
    }

    fn poll_nt(
        &self,
        _fds: &mut [PollFd],
        _millis: &mut u64,
        _sigmask: Option<&SigSet>,
    ) -> SysResult<usize> {
        // Only reachable when the platform oracle reports Windows.
        Err(Errno::ENOSYS)
    }

    fn sigprocmask(&self, how: SigHow, set: Option<&SigSet>) -> SysResult<SigSet> {
        let new = set.map(|s| s.to_libc());
        let newp = new
            .as_ref()
            .map_or(std::ptr::null(), |s| s as *const libc::sigset_t);
        let mut old: libc::sigset_t = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::pthread_sigmask(how.to_libc(), newp, &mut old) };
        if rc != 0 {
            return Err(Errno(rc));
        }
        Ok(SigSet::from_libc(&old))
    }
}
