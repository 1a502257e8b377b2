//! Runtime configuration.
//!
//! Instrumentation is chosen once, when a [`crate::Shim`] is built. The
//! environment can switch it without rebuilding:
//!
//! - `SYSSHIM_STRACE` - emit one trace line per call
//! - `SYSSHIM_MEMCHECK` - validate caller pointers at the C ABI surface
//!
//! Both accept `1`/`0`, `true`/`false`, `on`/`off` and `yes`/`no`.

use std::env;
use tracing::warn;

pub const STRACE_VAR: &str = "SYSSHIM_STRACE";
pub const MEMCHECK_VAR: &str = "SYSSHIM_MEMCHECK";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub strace: bool,
    pub memcheck: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strace: false,
            memcheck: cfg!(debug_assertions),
        }
    }
}

impl Config {
    /// Defaults overridden by whatever the environment sets.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            strace: flag(STRACE_VAR, lookup(STRACE_VAR)).unwrap_or(defaults.strace),
            memcheck: flag(MEMCHECK_VAR, lookup(MEMCHECK_VAR)).unwrap_or(defaults.memcheck),
        }
    }
}

fn flag(name: &str, value: Option<String>) -> Option<bool> {
    let value = value?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" | "" => Some(false),
        other => {
            warn!("ignoring {}={:?}: expected a boolean", name, other);
            None
        }
    }
}
