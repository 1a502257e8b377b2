//! Running-kernel detection.
//!
//! The set of kernels sysshim knows how to talk to is closed and small, so it
//! is modelled as a plain enum resolved once per process. Each dispatcher
//! operation consumes it with a single `match`, and the order of the arms in
//! that match is the priority order between platform paths.

use std::ffi::CStr;
use std::fmt;
use std::sync::OnceLock;

/// The kernel the process is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    Xnu,
    FreeBsd,
    OpenBsd,
    NetBsd,
    Windows,
    /// No operating system, or one sysshim has no knowledge of.
    Metal,
}

/// How a platform exposes pseudo-terminal allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtyPrimitive {
    /// A multiplexer device that hands out a new master on every open.
    Device(&'static CStr),
    /// A dedicated `posix_openpt` system call.
    Syscall,
    /// Nothing usable.
    None,
}

/// How a platform can wait on descriptors under a temporary signal mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigmaskWait {
    /// The kernel swaps the mask and waits in one step (`ppoll`).
    Atomic,
    /// The mask swap, the wait and the restore are three separate calls.
    Sequenced,
    /// The whole wait is emulated on top of a foreign primitive.
    Emulated,
}

static CURRENT: OnceLock<Platform> = OnceLock::new();

impl Platform {
    /// The platform this process is running on.
    pub fn current() -> Platform {
        *CURRENT.get_or_init(Platform::detect)
    }

    fn detect() -> Platform {
        if cfg!(any(target_os = "linux", target_os = "android")) {
            Platform::Linux
        } else if cfg!(any(target_os = "macos", target_os = "ios")) {
            Platform::Xnu
        } else if cfg!(target_os = "freebsd") {
            Platform::FreeBsd
        } else if cfg!(target_os = "openbsd") {
            Platform::OpenBsd
        } else if cfg!(target_os = "netbsd") {
            Platform::NetBsd
        } else if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Metal
        }
    }

    pub fn is_linux(self) -> bool {
        self == Platform::Linux
    }

    pub fn is_xnu(self) -> bool {
        self == Platform::Xnu
    }

    pub fn is_freebsd(self) -> bool {
        self == Platform::FreeBsd
    }

    pub fn is_openbsd(self) -> bool {
        self == Platform::OpenBsd
    }

    pub fn is_netbsd(self) -> bool {
        self == Platform::NetBsd
    }

    pub fn is_windows(self) -> bool {
        self == Platform::Windows
    }

    pub fn is_metal(self) -> bool {
        self == Platform::Metal
    }

    /// Whether the platform has a Unix kernel interface at all.
    pub fn is_unix(self) -> bool {
        !matches!(self, Platform::Windows | Platform::Metal)
    }

    pub fn pty_primitive(self) -> PtyPrimitive {
        match self {
            Platform::Linux | Platform::Xnu => PtyPrimitive::Device(c"/dev/ptmx"),
            Platform::OpenBsd => PtyPrimitive::Device(c"/dev/ptm"),
            Platform::FreeBsd => PtyPrimitive::Syscall,
            Platform::NetBsd | Platform::Windows | Platform::Metal => PtyPrimitive::None,
        }
    }

    /// The signal-mask wait guarantee this platform is expected to provide.
    ///
    /// For `Atomic` platforms this is an expectation only: an old kernel may
    /// still report `ENOSYS`, in which case the dispatcher degrades to the
    /// sequenced path. [`crate::Shim::sigmask_guarantee`] reports what was
    /// actually observed.
    pub fn sigmask_wait(self) -> SigmaskWait {
        match self {
            Platform::Linux | Platform::FreeBsd | Platform::OpenBsd | Platform::Metal => {
                SigmaskWait::Atomic
            }
            Platform::Xnu | Platform::NetBsd => SigmaskWait::Sequenced,
            Platform::Windows => SigmaskWait::Emulated,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::Xnu => "xnu",
            Platform::FreeBsd => "freebsd",
            Platform::OpenBsd => "openbsd",
            Platform::NetBsd => "netbsd",
            Platform::Windows => "windows",
            Platform::Metal => "metal",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
