//! Registry of the exported C ABI entry points.
//!
//! Every function marked `#[shim_symbol]` lands in [`SHIM_SYMBOLS`] at link
//! time, so a loader or an `LD_PRELOAD` wrapper can find the shim that
//! stands in for a POSIX function without a hand-maintained table.

use linkme::distributed_slice;

/// Address of an exported `extern "C"` function.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FnPtr(pub *const ());

// SAFETY: points at immutable code.
unsafe impl Sync for FnPtr {}
unsafe impl Send for FnPtr {}

impl FnPtr {
    pub fn addr(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Debug for FnPtr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:p}", self.0)
    }
}

/// One exported entry point.
#[derive(Debug, Clone, Copy)]
pub struct Symbol {
    /// The POSIX name the entry point stands in for, e.g. `"ppoll"`.
    pub name: &'static str,
    pub addr: FnPtr,
}

#[distributed_slice]
pub static SHIM_SYMBOLS: [Symbol] = [..];

/// The shim standing in for POSIX function `name`.
pub fn lookup(name: &str) -> Option<FnPtr> {
    SHIM_SYMBOLS.iter().find(|sym| sym.name == name).map(|sym| sym.addr)
}

pub fn names() -> impl Iterator<Item = &'static str> {
    SHIM_SYMBOLS.iter().map(|sym| sym.name)
}
