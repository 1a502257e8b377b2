//! Terminal state snapshot and restore.
//!
//! Code that puts a terminal into raw mode calls [`remember`] first so that a
//! crashing process can put it back with [`restore`] before printing its
//! report. Restoring takes no locks and allocates nothing.

use crate::{Errno, Error, Result, sys::RawFd};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicI32, Ordering};

static SAVED: OnceLock<libc::termios> = OnceLock::new();
static SAVED_FD: AtomicI32 = AtomicI32::new(-1);

/// Snapshot the settings of terminal `fd`. Only the first snapshot is kept.
pub fn remember(fd: RawFd) -> Result<()> {
    let mut termios: libc::termios = unsafe { std::mem::zeroed() };
    if unsafe { libc::tcgetattr(fd, &mut termios) } != 0 {
        return Err(Error::from(Errno::last()));
    }
    if SAVED.set(termios).is_ok() {
        SAVED_FD.store(fd, Ordering::Release);
    }
    Ok(())
}

/// Whether a snapshot exists.
pub fn is_remembered() -> bool {
    SAVED_FD.load(Ordering::Acquire) >= 0
}

/// Put the remembered settings back. Returns false if there was nothing to
/// restore or the terminal refused.
pub fn restore() -> bool {
    let fd = SAVED_FD.load(Ordering::Acquire);
    match SAVED.get() {
        Some(termios) if fd >= 0 => unsafe { libc::tcsetattr(fd, libc::TCSANOW, termios) == 0 },
        _ => false,
    }
}
