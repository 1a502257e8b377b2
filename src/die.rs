//! Fatal abort coordinator.
//!
//! [`die`] ends the process after printing one backtrace, no matter how many
//! threads reach it at the same time. A process-wide gate holds the id of
//! the thread that is crashing. It starts out empty when the process starts,
//! is claimed with a single compare-and-swap by the first thread to arrive,
//! and is never reset. Every caller then takes exactly one of three exits:
//!
//! | caller                       | does                                   | exit status                 |
//! |------------------------------|----------------------------------------|-----------------------------|
//! | first to claim the gate      | restore tty, trap to debugger, backtrace | [`EXIT_DIED`]             |
//! | the owner, faulting again    | prints "die failed while dying"        | [`EXIT_DIED_WHILE_DYING`]   |
//! | anyone else                  | nothing                                | [`EXIT_LOST_RACE`]          |
//!
//! The gate is a bare atomic rather than a lock because it has to keep
//! working when the allocator or the lock implementation is what broke. For
//! the same reason nothing on the host path allocates: the backtrace is a
//! list of raw return addresses written straight to stderr.

use crate::strace::{TraceLine, signal_name};
use crate::sys::HostKernel;
use crate::{debugger, tty};
use std::fmt::Write;
use std::os::raw::c_int;
use std::sync::atomic::{AtomicU64, Ordering};

/// The crashing thread printed its report.
pub const EXIT_DIED: i32 = 77;
/// The crashing thread faulted again while reporting.
pub const EXIT_DIED_WHILE_DYING: i32 = 78;
/// Another thread was already crashing.
pub const EXIT_LOST_RACE: i32 = 79;

const NOBODY: u64 = 0;

const MAX_FRAMES: usize = 64;

/// Outcome of trying to claim the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    Won,
    /// The caller already owns the gate.
    Reentered,
    /// The gate belongs to the thread with this id.
    Lost(u64),
}

/// A write-once owner cell.
pub struct AbortGate {
    owner: AtomicU64,
}

impl Default for AbortGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AbortGate {
    pub const fn new() -> Self {
        Self {
            owner: AtomicU64::new(NOBODY),
        }
    }

    /// Claim the gate for thread `me`, which must be non-zero.
    pub fn claim(&self, me: u64) -> Claim {
        match self
            .owner
            .compare_exchange(NOBODY, me, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Claim::Won,
            Err(owner) if owner == me => Claim::Reentered,
            Err(owner) => Claim::Lost(owner),
        }
    }

    /// The thread currently crashing, if any.
    pub fn owner(&self) -> Option<u64> {
        match self.owner.load(Ordering::Acquire) {
            NOBODY => None,
            owner => Some(owner),
        }
    }
}

/// The steps [`die_with`] performs, separated from the gate logic.
pub trait CrashHooks {
    /// Non-zero id of the calling thread.
    fn thread_id(&self) -> u64;

    fn restore_tty(&self);

    fn debugger_attached(&self) -> bool;

    /// Trap into the debugger; returns if the debugger resumes us.
    fn debug_break(&self);

    fn show_backtrace(&self);

    /// Write `msg` to the diagnostic stream without allocating.
    fn report(&self, msg: &str);

    fn exit(&self, code: i32) -> !;
}

/// Run the three-way abort protocol against `gate`.
pub fn die_with(gate: &AbortGate, hooks: &impl CrashHooks) -> ! {
    let me = hooks.thread_id();
    match gate.claim(me) {
        Claim::Won => {
            hooks.restore_tty();
            if hooks.debugger_attached() {
                hooks.debug_break();
            }
            hooks.show_backtrace();
            hooks.exit(EXIT_DIED)
        }
        Claim::Reentered => {
            hooks.report("die failed while dying\n");
            hooks.exit(EXIT_DIED_WHILE_DYING)
        }
        Claim::Lost(_) => hooks.exit(EXIT_LOST_RACE),
    }
}

static GATE: AbortGate = AbortGate::new();

/// The process-wide gate [`die`] uses.
pub fn gate() -> &'static AbortGate {
    &GATE
}

/// The real process: stderr, the controlling terminal, `_exit`.
pub struct HostCrash;

fn write_stderr(bytes: &[u8]) {
    let mut rest = bytes;
    while !rest.is_empty() {
        let n = unsafe { libc::write(libc::STDERR_FILENO, rest.as_ptr().cast(), rest.len()) };
        if n <= 0 {
            return;
        }
        rest = &rest[n as usize..];
    }
}

impl CrashHooks for HostCrash {
    fn thread_id(&self) -> u64 {
        HostKernel::gettid()
    }

    fn restore_tty(&self) {
        tty::restore();
    }

    fn debugger_attached(&self) -> bool {
        debugger::is_attached()
    }

    fn debug_break(&self) {
        unsafe { libc::raise(libc::SIGTRAP) };
    }

    fn show_backtrace(&self) {
        let mut frames = [std::ptr::null_mut(); MAX_FRAMES];
        let n = frames::capture(&mut frames);
        if n == 0 {
            write_stderr(b"backtrace unavailable\n");
            return;
        }
        for (i, ip) in frames[..n].iter().enumerate() {
            let mut line = TraceLine::new();
            let _ = writeln!(line, "  #{:<2} {:p}", i, *ip);
            write_stderr(line.as_str().as_bytes());
        }
    }

    fn report(&self, msg: &str) {
        write_stderr(msg.as_bytes());
    }

    fn exit(&self, code: i32) -> ! {
        unsafe { libc::_exit(code) }
    }
}

/// Abort the process after printing a backtrace.
///
/// If a debugger is attached this traps into it first.
#[inline(never)]
#[cold]
pub fn die() -> ! {
    die_with(&GATE, &HostCrash)
}

/// Return addresses of the calling stack, without allocating or locking.
#[cfg(any(
    all(target_os = "linux", target_env = "gnu"),
    target_os = "macos",
    target_os = "ios"
))]
mod frames {
    use std::os::raw::{c_int, c_void};

    unsafe extern "C" {
        fn backtrace(buffer: *mut *mut c_void, size: c_int) -> c_int;
    }

    pub fn capture(buf: &mut [*mut c_void]) -> usize {
        let len = c_int::try_from(buf.len()).unwrap_or(c_int::MAX);
        let n = unsafe { backtrace(buf.as_mut_ptr(), len) };
        usize::try_from(n).unwrap_or(0)
    }
}

#[cfg(not(any(
    all(target_os = "linux", target_env = "gnu"),
    target_os = "macos",
    target_os = "ios"
)))]
mod frames {
    use std::os::raw::c_void;

    pub fn capture(_buf: &mut [*mut c_void]) -> usize {
        0
    }
}

/// Install [`die`] as the handler for the synchronous fault signals.
///
/// The signal stays unblocked while the handler runs, so a second fault on
/// the dying thread re-enters [`die`] and exits with
/// [`EXIT_DIED_WHILE_DYING`] instead of being killed by the kernel.
pub fn install_crash_handlers() {
    // glibc loads its unwinder with malloc on first use; do that now.
    frames::capture(&mut [std::ptr::null_mut(); 1]);
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = crash_handler as usize;
        sa.sa_flags = libc::SA_SIGINFO | libc::SA_NODEFER;

        libc::sigaction(libc::SIGSEGV, &sa, std::ptr::null_mut());
        libc::sigaction(libc::SIGILL, &sa, std::ptr::null_mut());
        libc::sigaction(libc::SIGBUS, &sa, std::ptr::null_mut());
        libc::sigaction(libc::SIGFPE, &sa, std::ptr::null_mut());
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
unsafe fn fault_addr(info: *const libc::siginfo_t) -> *mut libc::c_void {
    unsafe { (*info).si_addr() }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
unsafe fn fault_addr(info: *const libc::siginfo_t) -> *mut libc::c_void {
    unsafe { (*info).si_addr }
}

/// # Safety
///
/// Only to be invoked by the kernel as an `SA_SIGINFO` handler; `info` must
/// point to the siginfo for the signal being delivered.
unsafe extern "C" fn crash_handler(sig: c_int, info: *mut libc::siginfo_t, _context: *mut libc::c_void) {
    let mut line = TraceLine::new();
    let addr = if info.is_null() {
        std::ptr::null_mut()
    } else {
        unsafe { fault_addr(info) }
    };
    let _ = writeln!(line, "A fatal error has been detected:");
    let _ = writeln!(
        line,
        "SIG{} ({}) at {:p}",
        signal_name(sig).unwrap_or("UNKNOWN"),
        sig,
        addr
    );
    write_stderr(line.as_str().as_bytes());
    die();
}
