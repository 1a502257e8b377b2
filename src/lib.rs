//! sysshim - A cross-platform POSIX system call compatibility shim.
//!
//! sysshim presents one stable POSIX-style API and dispatches each call to
//! whichever kernel primitive the running operating system actually has,
//! emulating the POSIX semantics where the kernel has no native equivalent.
//! It also provides a race-free fatal abort path for crashing processes.
//!
//! # Modules
//!
//! - [`platform`] - Running-kernel detection and per-platform capabilities
//! - [`sys`] - Kernel call adapter (the [`sys::Kernel`] trait and its host implementation)
//! - [`time`] - Deadline representation and millisecond conversion
//! - [`memcheck`] - Caller memory validation for the C ABI surface
//! - [`calls`] - The compatibility dispatcher and its operations
//! - [`strace`] - Post-call trace rendering
//! - [`die`] - Fatal abort coordinator, with [`tty`] and [`debugger`] helpers
//! - [`libc`] - `extern "C"` entry points following the `-1`/`errno` convention
//! - [`symbols`] - Registry of the exported entry points
//! - [`config`] - Environment configuration
//!
//! # Error Handling
//!
//! Every dispatcher operation returns the consolidated [`Error`] type, whose
//! variants are the same regardless of which kernel path produced them.

pub mod calls;
pub mod config;
pub mod debugger;
pub mod die;
pub mod errno;
pub mod libc;
pub mod memcheck;
pub mod platform;
pub mod strace;
pub mod symbols;
pub mod sys;
pub mod time;
pub mod tty;

pub use errno::Errno;

/// Consolidated error type for all dispatcher operations.
///
/// Kernel-reported errors are normalized into this vocabulary so callers
/// never see per-platform codes, except inside [`Error::KernelRejected`],
/// which preserves the original code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("invalid argument")]
    InvalidArgument,

    #[error("operation not supported on this platform")]
    Unsupported,

    #[error("bad address")]
    Fault,

    #[error("resource temporarily unavailable")]
    Retryable,

    #[error("kernel rejected call: {0}")]
    KernelRejected(Errno),
}

impl Error {
    /// The C errno value this error is reported as through the C ABI.
    pub fn errno(&self) -> Errno {
        match self {
            Error::InvalidArgument => Errno::EINVAL,
            Error::Unsupported => Errno::ENOSYS,
            Error::Fault => Errno::EFAULT,
            Error::Retryable => Errno::EAGAIN,
            Error::KernelRejected(errno) => *errno,
        }
    }
}

impl From<Errno> for Error {
    fn from(errno: Errno) -> Self {
        if errno == Errno::EFAULT {
            Error::Fault
        } else if errno == Errno::EAGAIN || errno == Errno::EWOULDBLOCK {
            Error::Retryable
        } else if errno == Errno::ENOSYS {
            Error::Unsupported
        } else {
            Error::KernelRejected(errno)
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;

pub use calls::{Shim, ShimBuilder, SigmaskGuarantee, host};
pub use config::Config;
pub use platform::Platform;
pub use sys::{HostKernel, Kernel, PollFd, SigSet};
pub use time::Timespec;
