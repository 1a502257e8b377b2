//! Debugger detection.

/// Whether a debugger is tracing this process.
///
/// Safe to call from a signal handler: no allocation, no locks.
#[cfg(any(target_os = "linux", target_os = "android"))]
pub fn is_attached() -> bool {
    let mut buf = [0u8; 4096];
    let fd = unsafe {
        libc::open(
            c"/proc/self/status".as_ptr(),
            libc::O_RDONLY | libc::O_CLOEXEC,
        )
    };
    if fd < 0 {
        return false;
    }
    let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
    unsafe { libc::close(fd) };
    if n <= 0 {
        return false;
    }
    tracer_pid(&buf[..n as usize]).is_some_and(|pid| pid != 0)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
pub fn is_attached() -> bool {
    false
}

/// The `TracerPid:` value of a `/proc/<pid>/status` file.
pub fn tracer_pid(status: &[u8]) -> Option<u32> {
    const KEY: &[u8] = b"TracerPid:";
    let start = status.windows(KEY.len()).position(|w| w == KEY)? + KEY.len();
    let mut pid: u32 = 0;
    let mut digits = 0;
    for &b in status[start..].iter().skip_while(|b| **b == b' ' || **b == b'\t') {
        if !b.is_ascii_digit() {
            break;
        }
        pid = pid.checked_mul(10)?.checked_add(u32::from(b - b'0'))?;
        digits += 1;
    }
    (digits > 0).then_some(pid)
}
