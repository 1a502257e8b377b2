//! A scripted kernel that records every call the dispatcher makes.

#![allow(dead_code)]

use std::ffi::{CStr, CString};
use std::os::raw::c_int;
use std::sync::Mutex;
use sysshim::sys::{Kernel, PollFd, RawFd, SigHow, SysResult};
use sysshim::{Errno, SigSet, Timespec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open(CString, c_int),
    Close(RawFd),
    PosixOpenpt(c_int),
    Grantpt(RawFd),
    Unlockpt(RawFd),
    Ptsname(RawFd),
    Ppoll(usize, Option<Timespec>, Option<SigSet>),
    Poll(usize, c_int),
    PollNt(usize, u64, Option<SigSet>),
    Sigprocmask(SigHow, Option<SigSet>),
}

pub struct RecordingKernel {
    pub calls: Mutex<Vec<Call>>,
    pub mask: Mutex<SigSet>,
    /// Mask in force while the last `poll` ran.
    pub mask_during_poll: Mutex<Option<SigSet>>,
    pub open: SysResult<RawFd>,
    pub posix_openpt: SysResult<RawFd>,
    pub grantpt: SysResult<()>,
    pub unlockpt: SysResult<()>,
    pub ptsname: SysResult<String>,
    pub ppoll: SysResult<usize>,
    pub poll: SysResult<usize>,
    pub poll_nt: SysResult<usize>,
    /// Fail `sigprocmask` with this once `n` calls have succeeded.
    pub sigprocmask_fails_after: Option<(usize, Errno)>,
}

impl Default for RecordingKernel {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            mask: Mutex::new(SigSet::empty().with(libc::SIGUSR2)),
            mask_during_poll: Mutex::new(None),
            open: Ok(7),
            posix_openpt: Ok(7),
            grantpt: Ok(()),
            unlockpt: Ok(()),
            ptsname: Ok("/dev/pts/3".to_string()),
            ppoll: Ok(1),
            poll: Ok(1),
            poll_nt: Ok(1),
            sigprocmask_fails_after: None,
        }
    }
}

impl RecordingKernel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mask(&self) -> SigSet {
        *self.mask.lock().unwrap()
    }

    pub fn mask_during_poll(&self) -> Option<SigSet> {
        *self.mask_during_poll.lock().unwrap()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Kernel for RecordingKernel {
    fn open(&self, path: &CStr, flags: c_int, _mode: u32) -> SysResult<RawFd> {
        self.record(Call::Open(path.to_owned(), flags));
        self.open
    }

    fn close(&self, fd: RawFd) -> SysResult<()> {
        self.record(Call::Close(fd));
        Ok(())
    }

    fn posix_openpt(&self, flags: c_int) -> SysResult<RawFd> {
        self.record(Call::PosixOpenpt(flags));
        self.posix_openpt
    }

    fn grantpt(&self, fd: RawFd) -> SysResult<()> {
        self.record(Call::Grantpt(fd));
        self.grantpt
    }

    fn unlockpt(&self, fd: RawFd) -> SysResult<()> {
        self.record(Call::Unlockpt(fd));
        self.unlockpt
    }

    fn ptsname(&self, fd: RawFd) -> SysResult<String> {
        self.record(Call::Ptsname(fd));
        self.ptsname.clone()
    }

    fn ppoll(
        &self,
        fds: &mut [PollFd],
        timeout: Option<&Timespec>,
        sigmask: Option<&SigSet>,
    ) -> SysResult<usize> {
        self.record(Call::Ppoll(fds.len(), timeout.copied(), sigmask.copied()));
        self.ppoll
    }

    fn poll(&self, fds: &mut [PollFd], timeout_ms: c_int) -> SysResult<usize> {
        self.record(Call::Poll(fds.len(), timeout_ms));
        *self.mask_during_poll.lock().unwrap() = Some(self.mask());
        self.poll
    }

    fn poll_nt(
        &self,
        fds: &mut [PollFd],
        millis: &mut u64,
        sigmask: Option<&SigSet>,
    ) -> SysResult<usize> {
        self.record(Call::PollNt(fds.len(), *millis, sigmask.copied()));
        self.poll_nt
    }

    fn sigprocmask(&self, how: SigHow, set: Option<&SigSet>) -> SysResult<SigSet> {
        let done = self
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, Call::Sigprocmask(..)))
            .count();
        self.record(Call::Sigprocmask(how, set.copied()));
        if let Some((n, errno)) = self.sigprocmask_fails_after
            && done >= n
        {
            return Err(errno);
        }
        let mut mask = self.mask.lock().unwrap();
        let old = *mask;
        if let Some(set) = set {
            *mask = match how {
                SigHow::Block => SigSet::from_bits(old.bits() | set.bits()),
                SigHow::Unblock => SigSet::from_bits(old.bits() & !set.bits()),
                SigHow::SetMask => *set,
            };
        }
        Ok(old)
    }
}
