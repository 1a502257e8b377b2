//! Descriptor waits with an optional temporary signal mask.
//!
//! `ppoll` is the same as
//!
//! ```text
//! old = sigprocmask(SIG_SETMASK, sigmask)
//! poll(fds, timeout)
//! sigprocmask(SIG_SETMASK, old)
//! ```
//!
//! except that it happens atomically when the kernel can do that. On kernels
//! that cannot (XNU, NetBSD, or any kernel answering `ENOSYS`) the three
//! steps above are what actually runs, and a signal delivered between the
//! first two is handled under the old mask. [`Shim::sigmask_guarantee`]
//! reports which of the two a caller got.

use super::{Shim, SigmaskGuarantee};
use crate::platform::SigmaskWait;
use crate::strace::{Deadline, Mask, PollFds, Ret};
use crate::sys::{Kernel, PollFd, SigHow, SigSet};
use crate::time::{self, Timespec};
use crate::{Errno, Error, Result};
use std::fmt::Write;
use std::os::raw::c_int;
use tracing::{debug, warn};

impl<K: Kernel> Shim<K> {
    /// Wait for events on `fds` with `sigmask` installed for the duration.
    ///
    /// `timeout` of `None` blocks indefinitely; so does a timeout whose
    /// millisecond conversion overflows on the sequenced path. `sigmask` of
    /// `None` leaves the mask alone. Returns the number of ready descriptors.
    pub fn ppoll(
        &self,
        fds: &mut [PollFd],
        timeout: Option<&Timespec>,
        sigmask: Option<&SigSet>,
    ) -> Result<usize> {
        let rc = if timeout.is_some_and(|ts| !ts.is_normalized()) {
            Err(Error::InvalidArgument)
        } else {
            match self.platform.sigmask_wait() {
                SigmaskWait::Atomic => match self.kernel.ppoll(fds, timeout, sigmask) {
                    Err(e) if e == Errno::ENOSYS => {
                        debug!("ppoll not implemented by kernel; sequencing mask swap");
                        self.ppoll_sequenced(fds, timeout, sigmask)
                    }
                    rc => {
                        self.note_guarantee(SigmaskGuarantee::Atomic);
                        rc.map_err(Error::from)
                    }
                },
                SigmaskWait::Sequenced => self.ppoll_sequenced(fds, timeout, sigmask),
                SigmaskWait::Emulated => self.ppoll_emulated(fds, timeout, sigmask),
            }
        };
        self.strace.emit(|l| {
            write!(
                l,
                "ppoll({}, {}, {}, {}) → {}",
                PollFds(fds),
                fds.len(),
                Deadline(timeout),
                Mask(sigmask),
                Ret(&rc)
            )
        });
        rc
    }

    /// Wait for events on `fds` for up to `timeout_ms`; negative blocks.
    pub fn poll(&self, fds: &mut [PollFd], timeout_ms: c_int) -> Result<usize> {
        let rc = if self.platform.is_windows() {
            // poll_nt only ever sets bits.
            for pfd in fds.iter_mut() {
                pfd.revents = 0;
            }
            let mut millis = u64::try_from(timeout_ms).unwrap_or(u64::MAX);
            self.kernel
                .poll_nt(fds, &mut millis, None)
                .map_err(Error::from)
        } else {
            self.kernel.poll(fds, timeout_ms).map_err(Error::from)
        };
        self.strace.emit(|l| {
            write!(
                l,
                "poll({}, {}, {}) → {}",
                PollFds(fds),
                fds.len(),
                timeout_ms,
                Ret(&rc)
            )
        });
        rc
    }

    /// The non-atomic path: swap, wait, restore.
    ///
    /// The original mask is restored even if the wait fails, and a wait
    /// failure takes precedence over a restore failure.
    fn ppoll_sequenced(
        &self,
        fds: &mut [PollFd],
        timeout: Option<&Timespec>,
        sigmask: Option<&SigSet>,
    ) -> Result<usize> {
        self.note_guarantee(SigmaskGuarantee::Sequenced);
        let millis = time::poll_timeout(timeout);
        let Some(mask) = sigmask else {
            return self.kernel.poll(fds, millis).map_err(Error::from);
        };
        let old = self.kernel.sigprocmask(SigHow::SetMask, Some(mask))?;
        let waited = self.kernel.poll(fds, millis);
        let restored = self.kernel.sigprocmask(SigHow::SetMask, Some(&old));
        if let Err(e) = restored {
            warn!("failed to restore signal mask {:?}: {}", old, e);
        }
        let ready = waited?;
        restored?;
        Ok(ready)
    }

    /// The Windows path, emulated on top of `poll_nt`.
    ///
    /// Nothing checked on the way in is assumed here: the emulation re-derives
    /// its own timeout and re-checks the request it is given.
    fn ppoll_emulated(
        &self,
        fds: &mut [PollFd],
        timeout: Option<&Timespec>,
        sigmask: Option<&SigSet>,
    ) -> Result<usize> {
        self.note_guarantee(SigmaskGuarantee::Emulated);
        if c_int::try_from(fds.len()).is_err() {
            return Err(Error::InvalidArgument);
        }
        if timeout.is_some_and(|ts| !ts.is_normalized()) {
            return Err(Error::InvalidArgument);
        }
        let mut millis = time::wait_millis(timeout);
        for pfd in fds.iter_mut() {
            pfd.revents = 0;
        }
        Ok(self.kernel.poll_nt(fds, &mut millis, sigmask)?)
    }
}
