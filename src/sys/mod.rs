//! Kernel call adapter.
//!
//! The [`Kernel`] trait is the boundary between the dispatcher and the raw
//! kernel entry points. Every method is a thin pass-through that reports
//! failure as the kernel's own [`Errno`]; normalization into
//! [`crate::Error`] happens in the dispatcher, not here.
//!
//! [`HostKernel`] implements the trait for the kernel the process is actually
//! running on. The platform-specific pieces live in per-OS submodules that
//! are conditionally compiled, and are re-exported through `os`.

use crate::{Errno, time::Timespec};
use std::ffi::CStr;
use std::fmt;
use std::os::raw::{c_int, c_short};

#[cfg(any(target_os = "linux", target_os = "android"))]
mod linux;
#[cfg(any(target_os = "linux", target_os = "android"))]
use linux as os;

#[cfg(any(target_os = "macos", target_os = "ios"))]
mod darwin;
#[cfg(any(target_os = "macos", target_os = "ios"))]
use darwin as os;

#[cfg(any(target_os = "freebsd", target_os = "openbsd", target_os = "netbsd"))]
mod bsd;
#[cfg(any(target_os = "freebsd", target_os = "openbsd", target_os = "netbsd"))]
use bsd as os;

mod host;

pub use host::HostKernel;

pub type RawFd = c_int;

/// Result of a raw kernel call.
pub type SysResult<T> = core::result::Result<T, Errno>;

/// One watched descriptor, layout-compatible with `struct pollfd`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollFd {
    pub fd: c_int,
    pub events: c_short,
    pub revents: c_short,
}

const _: () = assert!(size_of::<PollFd>() == size_of::<libc::pollfd>());
const _: () = assert!(align_of::<PollFd>() == align_of::<libc::pollfd>());

impl PollFd {
    pub const IN: c_short = libc::POLLIN;
    pub const PRI: c_short = libc::POLLPRI;
    pub const OUT: c_short = libc::POLLOUT;
    pub const ERR: c_short = libc::POLLERR;
    pub const HUP: c_short = libc::POLLHUP;
    pub const NVAL: c_short = libc::POLLNVAL;

    pub fn new(fd: c_int, events: c_short) -> Self {
        Self {
            fd,
            events,
            revents: 0,
        }
    }
}

/// Highest signal number a [`SigSet`] can hold.
pub const SIGSET_MAX: c_int = 64;

/// A set of signals 1..=64, the eight bytes the kernel's `ppoll` reads.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SigSet(u64);

impl SigSet {
    pub const fn empty() -> Self {
        SigSet(0)
    }

    pub const fn full() -> Self {
        SigSet(u64::MAX)
    }

    pub const fn from_bits(bits: u64) -> Self {
        SigSet(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub fn with(mut self, sig: c_int) -> Self {
        self.add(sig);
        self
    }

    /// Add `sig`; out-of-range numbers are ignored.
    pub fn add(&mut self, sig: c_int) {
        if (1..=SIGSET_MAX).contains(&sig) {
            self.0 |= 1 << (sig - 1);
        }
    }

    pub fn remove(&mut self, sig: c_int) {
        if (1..=SIGSET_MAX).contains(&sig) {
            self.0 &= !(1 << (sig - 1));
        }
    }

    pub fn contains(&self, sig: c_int) -> bool {
        (1..=SIGSET_MAX).contains(&sig) && self.0 & (1 << (sig - 1)) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Signal numbers in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = c_int> + '_ {
        (1..=SIGSET_MAX).filter(|sig| self.contains(*sig))
    }

    pub fn to_libc(self) -> libc::sigset_t {
        // SAFETY: sigemptyset fully initializes the set before it is read.
        unsafe {
            let mut set: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut set);
            for sig in self.iter() {
                // Signals past the host's NSIG are rejected with EINVAL; drop them.
                libc::sigaddset(&mut set, sig);
            }
            set
        }
    }

    pub fn from_libc(set: &libc::sigset_t) -> Self {
        let mut out = SigSet::empty();
        for sig in 1..=SIGSET_MAX {
            // SAFETY: `set` is a valid, initialized sigset_t.
            if unsafe { libc::sigismember(set, sig) } == 1 {
                out.add(sig);
            }
        }
        out
    }
}

impl fmt::Debug for SigSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigSet({:#x})", self.0)
    }
}

/// How `sigprocmask` combines the given set with the current mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigHow {
    Block,
    Unblock,
    SetMask,
}

impl SigHow {
    pub fn to_libc(self) -> c_int {
        match self {
            SigHow::Block => libc::SIG_BLOCK,
            SigHow::Unblock => libc::SIG_UNBLOCK,
            SigHow::SetMask => libc::SIG_SETMASK,
        }
    }
}

/// Raw kernel primitives the dispatcher is built on.
///
/// Implementations must not retry, remap or otherwise interpret errors.
pub trait Kernel {
    /// `open(2)`.
    fn open(&self, path: &CStr, flags: c_int, mode: u32) -> SysResult<RawFd>;

    /// `close(2)`.
    fn close(&self, fd: RawFd) -> SysResult<()>;

    /// The dedicated `posix_openpt` system call.
    fn posix_openpt(&self, flags: c_int) -> SysResult<RawFd>;

    /// Grant access to the slave side of a pseudo-terminal master.
    fn grantpt(&self, fd: RawFd) -> SysResult<()>;

    /// Unlock the slave side of a pseudo-terminal master.
    fn unlockpt(&self, fd: RawFd) -> SysResult<()>;

    /// Path of the slave side of a pseudo-terminal master.
    fn ptsname(&self, fd: RawFd) -> SysResult<String>;

    /// Wait on `fds` with `sigmask` installed atomically for the duration.
    fn ppoll(
        &self,
        fds: &mut [PollFd],
        timeout: Option<&Timespec>,
        sigmask: Option<&SigSet>,
    ) -> SysResult<usize>;

    /// `poll(2)`; a negative timeout blocks indefinitely.
    fn poll(&self, fds: &mut [PollFd], timeout_ms: c_int) -> SysResult<usize>;

    /// Descriptor wait emulated on the Windows kernel. `millis` is
    /// `u64::MAX` for an infinite wait and may be updated with the time left.
    fn poll_nt(
        &self,
        fds: &mut [PollFd],
        millis: &mut u64,
        sigmask: Option<&SigSet>,
    ) -> SysResult<usize>;

    /// Change the calling thread's signal mask, returning the previous one.
    fn sigprocmask(&self, how: SigHow, set: Option<&SigSet>) -> SysResult<SigSet>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sigset_membership() {
        let set = SigSet::empty().with(libc::SIGINT).with(libc::SIGTERM);
        assert!(set.contains(libc::SIGINT));
        assert!(set.contains(libc::SIGTERM));
        assert!(!set.contains(libc::SIGHUP));
        assert_eq!(set.iter().count(), 2);
    }

    #[test]
    fn sigset_ignores_out_of_range() {
        let mut set = SigSet::empty();
        set.add(0);
        set.add(65);
        set.add(-1);
        assert!(set.is_empty());
        set.add(64);
        assert_eq!(set.bits(), 1 << 63);
    }

    #[test]
    fn sigset_libc_conversion_keeps_standard_signals() {
        let set = SigSet::empty()
            .with(libc::SIGINT)
            .with(libc::SIGUSR1)
            .with(libc::SIGCHLD);
        assert_eq!(SigSet::from_libc(&set.to_libc()), set);
    }
}
