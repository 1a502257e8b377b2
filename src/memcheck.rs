//! Caller memory validation.
//!
//! Buffers handed in through the C ABI are raw pointers. Before one is turned
//! into a slice and passed down to the kernel, the configured [`AddressCheck`]
//! decides whether the whole range is addressable. A failed check becomes a
//! deterministic `EFAULT` instead of undefined behavior.

use std::sync::OnceLock;

/// Decides whether a byte range may be read or written.
pub trait AddressCheck: Send + Sync {
    /// Whether every byte of `ptr..ptr + len` is addressable.
    ///
    /// A zero-length range is always valid, including a null one.
    fn is_valid(&self, ptr: *const u8, len: usize) -> bool;

    fn name(&self) -> &'static str;
}

/// No instrumentation: only the null-with-length case is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unchecked;

impl AddressCheck for Unchecked {
    fn is_valid(&self, ptr: *const u8, len: usize) -> bool {
        len == 0 || !ptr.is_null()
    }

    fn name(&self) -> &'static str {
        "unchecked"
    }
}

/// Asks the kernel whether every page covering the range is mapped.
///
/// `msync(MS_ASYNC)` on an unmapped page fails with `ENOMEM` on Linux, XNU
/// and the BSDs, and schedules no I/O for anonymous or already-clean pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct MappedCheck;

fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(|| {
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 { size as usize } else { 4096 }
    })
}

impl AddressCheck for MappedCheck {
    fn is_valid(&self, ptr: *const u8, len: usize) -> bool {
        if len == 0 {
            return true;
        }
        if ptr.is_null() {
            return false;
        }
        let start = ptr as usize;
        let Some(end) = start.checked_add(len) else {
            return false;
        };
        let page = page_size();
        let first = start & !(page - 1);
        let Some(last) = end.checked_add(page - 1).map(|e| e & !(page - 1)) else {
            return false;
        };
        let rc = unsafe { libc::msync(first as *mut libc::c_void, last - first, libc::MS_ASYNC) };
        rc == 0
    }

    fn name(&self) -> &'static str {
        "mapped"
    }
}

pub static UNCHECKED: Unchecked = Unchecked;
pub static MAPPED: MappedCheck = MappedCheck;

/// The checker for a configuration toggle.
pub fn select(enabled: bool) -> &'static dyn AddressCheck {
    if enabled { &MAPPED } else { &UNCHECKED }
}
