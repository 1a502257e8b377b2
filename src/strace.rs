//! System call tracing.
//!
//! When enabled, every dispatcher call emits exactly one line after it has
//! produced its result, in the form
//!
//! ```text
//! ppoll([{3, POLLIN, POLLIN}, {4, POLLOUT, 0}], 2, {1, 500000000}, {INT}) → 1
//! posix_openpt(0o400002) → -1 EINVAL
//! ```
//!
//! Lines are rendered into a fixed-size stack buffer and handed to `tracing`
//! under the `strace` target at `DEBUG` level. Rendering never allocates and
//! never feeds back into the traced call.

use crate::{Result, sys::PollFd, sys::SigSet, time::Timespec};
use std::fmt::{self, Write};
use std::os::raw::{c_int, c_short};
use tracing::debug;

/// Array arguments show at most this many elements before `...`.
pub const MAX_ELEMENTS: usize = 5;

const LINE_CAPACITY: usize = 512;

/// Tracer selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strace {
    #[default]
    Off,
    On,
}

impl Strace {
    pub fn is_enabled(self) -> bool {
        self == Strace::On
    }

    /// Render and emit one trace line. `render` is not called when off.
    pub fn emit(self, render: impl FnOnce(&mut TraceLine) -> fmt::Result) {
        if self == Strace::Off {
            return;
        }
        let mut line = TraceLine::new();
        // A full buffer is reported as an error by `write!`; keep what fit.
        let _ = render(&mut line);
        debug!(target: "strace", "{}", line.as_str());
    }
}

/// A bounded, stack-allocated trace line.
pub struct TraceLine {
    buf: [u8; LINE_CAPACITY],
    len: usize,
    truncated: bool,
}

impl Default for TraceLine {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceLine {
    pub fn new() -> Self {
        Self {
            buf: [0; LINE_CAPACITY],
            len: 0,
            truncated: false,
        }
    }

    pub fn as_str(&self) -> &str {
        match std::str::from_utf8(&self.buf[..self.len]) {
            Ok(s) => s,
            // Truncation may have split a multi-byte character.
            Err(e) => std::str::from_utf8(&self.buf[..e.valid_up_to()]).unwrap_or_default(),
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

impl Write for TraceLine {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = LINE_CAPACITY - self.len;
        let n = s.len().min(room);
        self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        if n < s.len() {
            self.truncated = true;
            return Err(fmt::Error);
        }
        Ok(())
    }
}

pub fn signal_name(sig: c_int) -> Option<&'static str> {
    let name = match sig {
        libc::SIGHUP => "HUP",
        libc::SIGINT => "INT",
        libc::SIGQUIT => "QUIT",
        libc::SIGILL => "ILL",
        libc::SIGTRAP => "TRAP",
        libc::SIGABRT => "ABRT",
        libc::SIGBUS => "BUS",
        libc::SIGFPE => "FPE",
        libc::SIGKILL => "KILL",
        libc::SIGUSR1 => "USR1",
        libc::SIGSEGV => "SEGV",
        libc::SIGUSR2 => "USR2",
        libc::SIGPIPE => "PIPE",
        libc::SIGALRM => "ALRM",
        libc::SIGTERM => "TERM",
        libc::SIGCHLD => "CHLD",
        libc::SIGCONT => "CONT",
        libc::SIGSTOP => "STOP",
        libc::SIGTSTP => "TSTP",
        libc::SIGTTIN => "TTIN",
        libc::SIGTTOU => "TTOU",
        libc::SIGURG => "URG",
        libc::SIGWINCH => "WINCH",
        _ => return None,
    };
    Some(name)
}

/// Poll event bits, e.g. `POLLIN|POLLHUP`.
pub struct PollFlags(pub c_short);

impl fmt::Display for PollFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(c_short, &str); 6] = [
            (libc::POLLIN, "POLLIN"),
            (libc::POLLPRI, "POLLPRI"),
            (libc::POLLOUT, "POLLOUT"),
            (libc::POLLERR, "POLLERR"),
            (libc::POLLHUP, "POLLHUP"),
            (libc::POLLNVAL, "POLLNVAL"),
        ];
        let mut rest = self.0;
        let mut first = true;
        for (bit, name) in NAMES {
            if rest & bit != 0 {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                rest &= !bit;
                first = false;
            }
        }
        if rest != 0 {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "{:#x}", rest)?;
        } else if first {
            f.write_str("0")?;
        }
        Ok(())
    }
}

/// A descriptor array, capped at [`MAX_ELEMENTS`].
pub struct PollFds<'a>(pub &'a [PollFd]);

impl fmt::Display for PollFds<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, pfd) in self.0.iter().take(MAX_ELEMENTS).enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(
                f,
                "{{{}, {}, {}}}",
                pfd.fd,
                PollFlags(pfd.events),
                PollFlags(pfd.revents)
            )?;
        }
        if self.0.len() > MAX_ELEMENTS {
            f.write_str(", ...")?;
        }
        f.write_str("]")
    }
}

pub struct Deadline<'a>(pub Option<&'a Timespec>);

impl fmt::Display for Deadline<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(ts) => write!(f, "{}", ts),
            None => f.write_str("NULL"),
        }
    }
}

pub struct Mask<'a>(pub Option<&'a SigSet>);

impl fmt::Display for Mask<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(set) = self.0 else {
            return f.write_str("NULL");
        };
        if *set == SigSet::full() {
            return f.write_str("~{}");
        }
        f.write_str("{")?;
        for (i, sig) in set.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            match signal_name(sig) {
                Some(name) => f.write_str(name)?,
                None => write!(f, "{}", sig)?,
            }
        }
        f.write_str("}")
    }
}

/// A call result: the value, or `-1` followed by the errno name.
pub struct Ret<'a, T>(pub &'a Result<T>);

impl<T: fmt::Display> fmt::Display for Ret<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Ok(v) => write!(f, "{}", v),
            Err(e) => write!(f, "-1 {}", e.errno()),
        }
    }
}
