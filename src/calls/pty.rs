//! Pseudo-terminal allocation.

use super::Shim;
use crate::platform::PtyPrimitive;
use crate::strace::Ret;
use crate::sys::{Kernel, RawFd};
use crate::{Errno, Error, Result};
use std::fmt::Write;
use std::os::raw::c_int;
use tracing::debug;

/// An allocated pseudo-terminal: the master descriptor and the slave path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pty {
    pub master: RawFd,
    pub name: String,
}

impl<K: Kernel> Shim<K> {
    /// Open a new pseudo-terminal master.
    ///
    /// `flags` is usually `O_RDWR | O_NOCTTY`. Any access mode other than
    /// `O_RDWR` is rejected before the kernel is involved.
    pub fn posix_openpt(&self, flags: c_int) -> Result<RawFd> {
        let rc = if flags & libc::O_ACCMODE != libc::O_RDWR {
            Err(Error::InvalidArgument)
        } else {
            match self.platform.pty_primitive() {
                PtyPrimitive::Device(path) => {
                    self.kernel.open(path, flags, 0).map_err(Error::from)
                }
                PtyPrimitive::Syscall => self.kernel.posix_openpt(flags).map_err(|e| {
                    // FreeBSD reports an exhausted pty pool as ENOSPC where
                    // every other kernel says EAGAIN.
                    if e == Errno::ENOSPC {
                        Error::Retryable
                    } else {
                        Error::from(e)
                    }
                }),
                PtyPrimitive::None => Err(Error::Unsupported),
            }
        };
        self.strace
            .emit(|l| write!(l, "posix_openpt({:#o}) → {}", flags, Ret(&rc)));
        rc
    }

    /// Grant access to the slave side of `fd`.
    pub fn grantpt(&self, fd: RawFd) -> Result<()> {
        let rc = if self.platform.is_linux() {
            // devpts grants ownership on open.
            Ok(())
        } else if self.platform.is_unix() {
            self.kernel.grantpt(fd).map_err(Error::from)
        } else {
            Err(Error::Unsupported)
        };
        self.strace
            .emit(|l| write!(l, "grantpt({}) → {}", fd, Ret(&rc.map(|_| 0))));
        rc
    }

    /// Unlock the slave side of `fd`.
    pub fn unlockpt(&self, fd: RawFd) -> Result<()> {
        let rc = if self.platform.is_unix() {
            self.kernel.unlockpt(fd).map_err(Error::from)
        } else {
            Err(Error::Unsupported)
        };
        self.strace
            .emit(|l| write!(l, "unlockpt({}) → {}", fd, Ret(&rc.map(|_| 0))));
        rc
    }

    /// Path of the slave side of `fd`.
    pub fn ptsname(&self, fd: RawFd) -> Result<String> {
        let rc = if self.platform.is_unix() {
            self.kernel.ptsname(fd).map_err(Error::from)
        } else {
            Err(Error::Unsupported)
        };
        self.strace.emit(|l| match &rc {
            Ok(name) => write!(l, "ptsname({}) → {:?}", fd, name),
            Err(e) => write!(l, "ptsname({}) → NULL {}", fd, e.errno()),
        });
        rc
    }

    /// Allocate a pseudo-terminal ready for its slave side to be opened.
    ///
    /// The master is closed again if any step after opening it fails.
    pub fn open_pty(&self, flags: c_int) -> Result<Pty> {
        let master = self.posix_openpt(libc::O_RDWR | flags)?;
        let ready = self
            .grantpt(master)
            .and_then(|_| self.unlockpt(master))
            .and_then(|_| self.ptsname(master));
        match ready {
            Ok(name) => {
                debug!("allocated pty {} (master fd {})", name, master);
                Ok(Pty { master, name })
            }
            Err(e) => {
                let _ = self.kernel.close(master);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, ShimBuilder, platform::Platform, sys::HostKernel};

    #[test]
    fn read_only_is_rejected() {
        let shim = ShimBuilder::new().build(HostKernel);
        assert_eq!(
            shim.posix_openpt(libc::O_RDONLY),
            Err(Error::InvalidArgument)
        );
        assert_eq!(
            shim.posix_openpt(libc::O_WRONLY | libc::O_NOCTTY),
            Err(Error::InvalidArgument)
        );
    }

    #[test]
    fn no_primitive_is_unsupported() {
        let shim = ShimBuilder::new()
            .platform(Platform::NetBsd)
            .build(HostKernel);
        assert_eq!(shim.posix_openpt(libc::O_RDWR), Err(Error::Unsupported));
        let shim = ShimBuilder::new()
            .platform(Platform::Windows)
            .build(HostKernel);
        assert_eq!(shim.unlockpt(3), Err(Error::Unsupported));
        assert_eq!(shim.ptsname(3), Err(Error::Unsupported));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn host_pty_allocation() {
        let shim = ShimBuilder::new().build(HostKernel);
        match shim.open_pty(libc::O_NOCTTY) {
            Ok(pty) => {
                assert!(pty.master >= 0);
                assert!(pty.name.starts_with("/dev/pts/"));
                unsafe { libc::close(pty.master) };
            }
            // Containers without devpts.
            Err(e) => assert!(matches!(e, Error::KernelRejected(_))),
        }
    }
}
