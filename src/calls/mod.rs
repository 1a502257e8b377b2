//! Compatibility dispatcher.
//!
//! A [`Shim`] maps each logical POSIX operation onto whatever the running
//! kernel actually provides. Every operation follows the same shape:
//!
//! 1. validate the request without touching the kernel;
//! 2. pick one platform path with a single `match` on [`Platform`], whose arm
//!    order is the priority order;
//! 3. normalize the kernel's answer into [`crate::Error`];
//! 4. hand the finished result to the tracer, which cannot change it.
//!
//! The operations themselves live in [`pty`] and [`poll`].

use crate::{
    config::Config,
    memcheck::{self, AddressCheck},
    platform::Platform,
    strace::Strace,
    sys::{HostKernel, Kernel},
};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU8, Ordering};

pub mod poll;
pub mod pty;

pub use pty::Pty;

/// Which signal-mask guarantee descriptor waits have actually provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigmaskGuarantee {
    /// No descriptor wait has run yet.
    Unknown,
    /// The mask swap and the wait were one kernel step.
    Atomic,
    /// The mask was swapped, waited under, and restored in three steps. A
    /// signal that arrives between the swap and the wait is handled under
    /// the old mask.
    Sequenced,
    /// The wait was emulated on a foreign kernel primitive.
    Emulated,
}

impl SigmaskGuarantee {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => SigmaskGuarantee::Atomic,
            2 => SigmaskGuarantee::Sequenced,
            3 => SigmaskGuarantee::Emulated,
            _ => SigmaskGuarantee::Unknown,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            SigmaskGuarantee::Unknown => 0,
            SigmaskGuarantee::Atomic => 1,
            SigmaskGuarantee::Sequenced => 2,
            SigmaskGuarantee::Emulated => 3,
        }
    }
}

pub struct ShimBuilder {
    platform: Option<Platform>,
    strace: bool,
    memcheck: bool,
}

impl Default for ShimBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ShimBuilder {
    pub fn new() -> Self {
        Self::from_config(Config::default())
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            platform: None,
            strace: config.strace,
            memcheck: config.memcheck,
        }
    }

    /// Dispatch as if running on `platform` instead of the detected one.
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn strace(mut self, strace: bool) -> Self {
        self.strace = strace;
        self
    }

    pub fn memcheck(mut self, memcheck: bool) -> Self {
        self.memcheck = memcheck;
        self
    }

    pub fn build<K: Kernel>(self, kernel: K) -> Shim<K> {
        Shim {
            kernel,
            platform: self.platform.unwrap_or_else(Platform::current),
            check: memcheck::select(self.memcheck),
            strace: if self.strace { Strace::On } else { Strace::Off },
            guarantee: AtomicU8::new(SigmaskGuarantee::Unknown.as_u8()),
        }
    }
}

/// The compatibility dispatcher for one kernel.
pub struct Shim<K: Kernel = HostKernel> {
    kernel: K,
    platform: Platform,
    check: &'static dyn AddressCheck,
    strace: Strace,
    guarantee: AtomicU8,
}

impl<K: Kernel> Shim<K> {
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// The caller-memory checker used at the C ABI surface.
    pub fn address_check(&self) -> &'static dyn AddressCheck {
        self.check
    }

    pub fn strace(&self) -> Strace {
        self.strace
    }

    /// The guarantee the most recent descriptor wait provided.
    ///
    /// Callers that need strict atomicity can check for
    /// [`SigmaskGuarantee::Atomic`] after their first call.
    pub fn sigmask_guarantee(&self) -> SigmaskGuarantee {
        SigmaskGuarantee::from_u8(self.guarantee.load(Ordering::Relaxed))
    }

    fn note_guarantee(&self, guarantee: SigmaskGuarantee) {
        self.guarantee.store(guarantee.as_u8(), Ordering::Relaxed);
    }
}

static HOST: OnceLock<Shim<HostKernel>> = OnceLock::new();

/// The process-wide dispatcher for the host kernel, configured from the
/// environment on first use.
pub fn host() -> &'static Shim<HostKernel> {
    HOST.get_or_init(|| ShimBuilder::from_config(Config::from_env()).build(HostKernel))
}
