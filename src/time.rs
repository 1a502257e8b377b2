//! Deadlines and time unit conversion.
//!
//! Conversions report overflow as a flag next to the value, like the
//! `overflowing_*` integer methods, and leave the fallback policy to the
//! caller.

use std::fmt;

const NANOS_PER_SEC: i64 = 1_000_000_000;
const NANOS_PER_MILLI: i64 = 1_000_000;
const MILLIS_PER_SEC: u64 = 1_000;

/// Time specification with seconds and nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timespec {
    pub sec: i64,
    pub nsec: i64,
}

impl Timespec {
    pub const fn new(sec: i64, nsec: i64) -> Self {
        Self { sec, nsec }
    }

    /// Whether `nsec` is within `0..1_000_000_000` and `sec` is non-negative.
    pub fn is_normalized(&self) -> bool {
        self.sec >= 0 && (0..NANOS_PER_SEC).contains(&self.nsec)
    }

    /// Convert to whole milliseconds, truncating sub-millisecond remainder.
    ///
    /// Returns the converted value and whether the conversion overflowed.
    /// Negative fields cannot be represented and count as overflow, which the
    /// wait helpers below turn into "block indefinitely". A negative deadline
    /// is an error rather than an infinite wait, so callers must reject
    /// anything that fails [`is_normalized`](Self::is_normalized) first, as
    /// `Shim::ppoll` does with `InvalidArgument`.
    pub fn to_millis(&self) -> (u64, bool) {
        if self.sec < 0 || self.nsec < 0 {
            return (0, true);
        }
        let Some(secs) = (self.sec as u64).checked_mul(MILLIS_PER_SEC) else {
            return (0, true);
        };
        match secs.checked_add((self.nsec / NANOS_PER_MILLI) as u64) {
            Some(millis) => (millis, false),
            None => (0, true),
        }
    }

    pub fn from_millis(millis: u64) -> Self {
        Self {
            sec: (millis / MILLIS_PER_SEC) as i64,
            nsec: (millis % MILLIS_PER_SEC) as i64 * NANOS_PER_MILLI,
        }
    }

    #[cfg(unix)]
    pub fn to_libc(self) -> libc::timespec {
        libc::timespec {
            tv_sec: self.sec as libc::time_t,
            tv_nsec: self.nsec as _,
        }
    }

    #[cfg(unix)]
    pub fn from_libc(ts: &libc::timespec) -> Self {
        Self {
            sec: ts.tv_sec as i64,
            nsec: ts.tv_nsec as i64,
        }
    }
}

impl fmt::Display for Timespec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, {}}}", self.sec, self.nsec)
    }
}

/// Milliseconds to hand to `poll(2)` for an optional deadline.
///
/// An absent deadline, or one whose conversion overflows or does not fit
/// `poll`'s `int` argument, means "block indefinitely" (`-1`).
pub fn poll_timeout(deadline: Option<&Timespec>) -> libc::c_int {
    let Some(deadline) = deadline else {
        return -1;
    };
    match deadline.to_millis() {
        (millis, false) => libc::c_int::try_from(millis).unwrap_or(-1),
        (_, true) => -1,
    }
}

/// Milliseconds for primitives that take an unsigned count, `u64::MAX` meaning
/// "block indefinitely".
pub fn wait_millis(deadline: Option<&Timespec>) -> u64 {
    match deadline.map(Timespec::to_millis) {
        Some((millis, false)) => millis,
        _ => u64::MAX,
    }
}
