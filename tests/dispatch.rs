//! Dispatcher behavior against a recording kernel.
//!
//! Every test pins the platform explicitly so the observed kernel call
//! sequence does not depend on the machine running the suite.

mod common;

use common::{Call, RecordingKernel};
use sysshim::sys::SigHow;
use sysshim::{Errno, Error, Platform, PollFd, Shim, ShimBuilder, SigSet, SigmaskGuarantee, Timespec};

const ALL_PLATFORMS: [Platform; 7] = [
    Platform::Linux,
    Platform::Xnu,
    Platform::FreeBsd,
    Platform::OpenBsd,
    Platform::NetBsd,
    Platform::Windows,
    Platform::Metal,
];

fn shim_on(platform: Platform, kernel: RecordingKernel) -> Shim<RecordingKernel> {
    ShimBuilder::new()
        .platform(platform)
        .strace(true)
        .build(kernel)
}

fn watched() -> [PollFd; 2] {
    [PollFd::new(3, PollFd::IN), PollFd::new(4, PollFd::OUT)]
}

#[test]
fn test_openpt_read_only_never_reaches_kernel() {
    for platform in ALL_PLATFORMS {
        let shim = shim_on(platform, RecordingKernel::new());
        assert_eq!(
            shim.posix_openpt(libc::O_RDONLY),
            Err(Error::InvalidArgument),
            "{platform}"
        );
        assert!(shim.kernel().calls().is_empty(), "{platform}");
    }
}

#[test]
fn test_openpt_linux_opens_ptmx_once() {
    let shim = shim_on(Platform::Linux, RecordingKernel::new());
    assert_eq!(shim.posix_openpt(libc::O_RDWR | libc::O_NOCTTY), Ok(7));
    assert_eq!(
        shim.kernel().calls(),
        vec![Call::Open(
            c"/dev/ptmx".to_owned(),
            libc::O_RDWR | libc::O_NOCTTY
        )]
    );
}

#[test]
fn test_openpt_openbsd_uses_ptm() {
    let shim = shim_on(Platform::OpenBsd, RecordingKernel::new());
    assert_eq!(shim.posix_openpt(libc::O_RDWR), Ok(7));
    assert_eq!(
        shim.kernel().calls(),
        vec![Call::Open(c"/dev/ptm".to_owned(), libc::O_RDWR)]
    );
}

#[test]
fn test_openpt_freebsd_pool_exhaustion_is_retryable() {
    let kernel = RecordingKernel {
        posix_openpt: Err(Errno::ENOSPC),
        ..RecordingKernel::default()
    };
    let shim = shim_on(Platform::FreeBsd, kernel);
    assert_eq!(shim.posix_openpt(libc::O_RDWR), Err(Error::Retryable));
    assert_eq!(shim.kernel().calls(), vec![Call::PosixOpenpt(libc::O_RDWR)]);
}

#[test]
fn test_openpt_kernel_errors_are_normalized() {
    let kernel = RecordingKernel {
        open: Err(Errno::EAGAIN),
        ..RecordingKernel::default()
    };
    let shim = shim_on(Platform::Xnu, kernel);
    assert_eq!(shim.posix_openpt(libc::O_RDWR), Err(Error::Retryable));

    let kernel = RecordingKernel {
        open: Err(Errno::EACCES),
        ..RecordingKernel::default()
    };
    let shim = shim_on(Platform::Linux, kernel);
    assert_eq!(
        shim.posix_openpt(libc::O_RDWR),
        Err(Error::KernelRejected(Errno::EACCES))
    );
}

#[test]
fn test_openpt_without_primitive_is_unsupported() {
    for platform in [Platform::NetBsd, Platform::Windows, Platform::Metal] {
        let shim = shim_on(platform, RecordingKernel::new());
        assert_eq!(
            shim.posix_openpt(libc::O_RDWR),
            Err(Error::Unsupported),
            "{platform}"
        );
        assert!(shim.kernel().calls().is_empty());
    }
}

#[test]
fn test_open_pty_closes_master_on_failure() {
    let kernel = RecordingKernel {
        unlockpt: Err(Errno::EINVAL),
        ..RecordingKernel::default()
    };
    let shim = shim_on(Platform::Xnu, kernel);
    assert_eq!(
        shim.open_pty(libc::O_NOCTTY),
        Err(Error::KernelRejected(Errno::EINVAL))
    );
    assert_eq!(
        shim.kernel().calls(),
        vec![
            Call::Open(c"/dev/ptmx".to_owned(), libc::O_RDWR | libc::O_NOCTTY),
            Call::Grantpt(7),
            Call::Unlockpt(7),
            Call::Close(7),
        ]
    );
}

#[test]
fn test_open_pty_on_linux_skips_grantpt() {
    let shim = shim_on(Platform::Linux, RecordingKernel::new());
    let pty = shim.open_pty(0).unwrap();
    assert_eq!(pty.master, 7);
    assert_eq!(pty.name, "/dev/pts/3");
    assert_eq!(
        shim.kernel().calls(),
        vec![
            Call::Open(c"/dev/ptmx".to_owned(), libc::O_RDWR),
            Call::Unlockpt(7),
            Call::Ptsname(7),
        ]
    );
}

#[test]
fn test_ppoll_atomic_on_linux() {
    let shim = shim_on(Platform::Linux, RecordingKernel::new());
    let mut fds = watched();
    let timeout = Timespec::new(2, 0);
    let mask = SigSet::empty().with(libc::SIGINT);
    assert_eq!(shim.ppoll(&mut fds, Some(&timeout), Some(&mask)), Ok(1));
    assert_eq!(
        shim.kernel().calls(),
        vec![Call::Ppoll(2, Some(timeout), Some(mask))]
    );
    assert_eq!(shim.sigmask_guarantee(), SigmaskGuarantee::Atomic);
}

#[test]
fn test_ppoll_enosys_falls_back_and_restores_mask() {
    let kernel = RecordingKernel {
        ppoll: Err(Errno::ENOSYS),
        ..RecordingKernel::default()
    };
    let shim = shim_on(Platform::Linux, kernel);
    let original = shim.kernel().mask();
    let mask = SigSet::empty().with(libc::SIGINT).with(libc::SIGTERM);
    let mut fds = watched();

    assert_eq!(
        shim.ppoll(&mut fds, Some(&Timespec::new(1, 250_000_000)), Some(&mask)),
        Ok(1)
    );
    assert_eq!(
        shim.kernel().calls(),
        vec![
            Call::Ppoll(2, Some(Timespec::new(1, 250_000_000)), Some(mask)),
            Call::Sigprocmask(SigHow::SetMask, Some(mask)),
            Call::Poll(2, 1250),
            Call::Sigprocmask(SigHow::SetMask, Some(original)),
        ]
    );
    assert_eq!(shim.kernel().mask_during_poll(), Some(mask));
    assert_eq!(shim.kernel().mask(), original);
    assert_eq!(shim.sigmask_guarantee(), SigmaskGuarantee::Sequenced);
}

#[test]
fn test_ppoll_other_errors_do_not_fall_back() {
    let kernel = RecordingKernel {
        ppoll: Err(Errno::EINTR),
        ..RecordingKernel::default()
    };
    let shim = shim_on(Platform::FreeBsd, kernel);
    assert_eq!(
        shim.ppoll(&mut watched(), None, Some(&SigSet::full())),
        Err(Error::KernelRejected(Errno::EINTR))
    );
    assert_eq!(shim.kernel().calls().len(), 1);
}

#[test]
fn test_ppoll_xnu_sequence_is_swap_wait_restore() {
    let shim = shim_on(Platform::Xnu, RecordingKernel::new());
    let original = shim.kernel().mask();
    let mask = SigSet::empty().with(libc::SIGINT);

    assert_eq!(shim.ppoll(&mut watched(), None, Some(&mask)), Ok(1));
    assert_eq!(
        shim.kernel().calls(),
        vec![
            Call::Sigprocmask(SigHow::SetMask, Some(mask)),
            Call::Poll(2, -1),
            Call::Sigprocmask(SigHow::SetMask, Some(original)),
        ]
    );
    assert_eq!(shim.kernel().mask(), original);
}

#[test]
fn test_ppoll_sequenced_without_mask_only_waits() {
    let shim = shim_on(Platform::NetBsd, RecordingKernel::new());
    assert_eq!(
        shim.ppoll(&mut watched(), Some(&Timespec::new(0, 5_000_000)), None),
        Ok(1)
    );
    assert_eq!(shim.kernel().calls(), vec![Call::Poll(2, 5)]);
}

#[test]
fn test_ppoll_restores_mask_when_wait_fails() {
    let kernel = RecordingKernel {
        poll: Err(Errno::EINTR),
        ..RecordingKernel::default()
    };
    let shim = shim_on(Platform::Xnu, kernel);
    let original = shim.kernel().mask();
    assert_eq!(
        shim.ppoll(&mut watched(), None, Some(&SigSet::full())),
        Err(Error::KernelRejected(Errno::EINTR))
    );
    assert_eq!(shim.kernel().mask(), original);
    assert_eq!(shim.kernel().calls().len(), 3);
}

#[test]
fn test_ppoll_reports_failed_restore() {
    let kernel = RecordingKernel {
        sigprocmask_fails_after: Some((1, Errno::EINVAL)),
        ..RecordingKernel::default()
    };
    let shim = shim_on(Platform::Xnu, kernel);
    assert_eq!(
        shim.ppoll(&mut watched(), None, Some(&SigSet::full())),
        Err(Error::KernelRejected(Errno::EINVAL))
    );
}

#[test]
fn test_ppoll_overflowing_timeout_blocks_indefinitely() {
    let huge = Timespec::new(i64::MAX, 999_999_999);
    let beyond_int = Timespec::new(3_000_000, 0);
    for timeout in [huge, beyond_int] {
        let shim = shim_on(Platform::Xnu, RecordingKernel::new());
        shim.ppoll(&mut watched(), Some(&timeout), None).unwrap();
        assert_eq!(shim.kernel().calls(), vec![Call::Poll(2, -1)]);
    }
}

#[test]
fn test_ppoll_denormalized_timeout_is_rejected_everywhere() {
    for platform in ALL_PLATFORMS {
        let shim = shim_on(platform, RecordingKernel::new());
        for bad in [Timespec::new(0, -1), Timespec::new(0, 1_000_000_000), Timespec::new(-1, 0)] {
            assert_eq!(
                shim.ppoll(&mut watched(), Some(&bad), None),
                Err(Error::InvalidArgument),
                "{platform} {bad}"
            );
        }
        assert!(shim.kernel().calls().is_empty(), "{platform}");
    }
}

#[test]
fn test_ppoll_windows_is_emulated() {
    let shim = shim_on(Platform::Windows, RecordingKernel::new());
    let mask = SigSet::empty().with(libc::SIGINT);
    let mut fds = watched();
    fds[0].revents = PollFd::HUP;

    assert_eq!(
        shim.ppoll(&mut fds, Some(&Timespec::new(1, 500_000_000)), Some(&mask)),
        Ok(1)
    );
    assert_eq!(fds[0].revents, 0);
    assert_eq!(shim.ppoll(&mut fds, None, None), Ok(1));
    assert_eq!(
        shim.kernel().calls(),
        vec![
            Call::PollNt(2, 1500, Some(mask)),
            Call::PollNt(2, u64::MAX, None),
        ]
    );
    assert_eq!(shim.sigmask_guarantee(), SigmaskGuarantee::Emulated);
}

#[test]
fn test_poll_routes_by_platform() {
    let shim = shim_on(Platform::Linux, RecordingKernel::new());
    assert_eq!(shim.poll(&mut watched(), 10), Ok(1));
    assert_eq!(shim.kernel().calls(), vec![Call::Poll(2, 10)]);

    let shim = shim_on(Platform::Windows, RecordingKernel::new());
    assert_eq!(shim.poll(&mut watched(), -1), Ok(1));
    assert_eq!(shim.kernel().calls(), vec![Call::PollNt(2, u64::MAX, None)]);
}

#[test]
fn test_poll_windows_clears_stale_revents() {
    let shim = shim_on(Platform::Windows, RecordingKernel::new());
    let mut fds = watched();
    fds[0].revents = PollFd::HUP;
    fds[1].revents = PollFd::ERR;

    assert_eq!(shim.poll(&mut fds, 0), Ok(1));
    assert_eq!(fds[0].revents, 0);
    assert_eq!(fds[1].revents, 0);
    assert_eq!(shim.kernel().calls(), vec![Call::PollNt(2, 0, None)]);
}

#[test]
fn test_invalid_requests_never_arm_abort_gate() {
    for platform in ALL_PLATFORMS {
        let shim = shim_on(platform, RecordingKernel::new());
        for _ in 0..100 {
            let _ = shim.posix_openpt(libc::O_WRONLY);
            let _ = shim.ppoll(&mut [], Some(&Timespec::new(0, -5)), None);
        }
    }
    assert_eq!(sysshim::die::gate().owner(), None);
}
