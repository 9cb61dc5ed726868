//! Cross-thread readiness signalling and multiplexed waits.
//!
//! A [`Notifier`] is an `eventfd` counter: producers add to it from any
//! thread, and the consumer sees its descriptor become readable inside a
//! [`wait_readable`] call. Notifications coalesce; a single `drain` consumes
//! every wake posted since the previous one, so the consumer must empty the
//! associated queue after draining.
//!
//! # Platform
//!
//! Linux only (`eventfd(2)`, `poll(2)`).

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

/// Readiness signal observable by `poll(2)`.
#[derive(Debug)]
pub struct Notifier {
    fd: OwnedFd,
}

impl Notifier {
    /// Create a non-blocking, close-on-exec eventfd with a zero counter.
    pub fn new() -> io::Result<Self> {
        // SAFETY: eventfd takes no pointers; a negative return is checked below.
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        // SAFETY: `fd` was just created and nothing else owns it.
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };
        Ok(Self { fd })
    }

    /// Post one wake.
    pub fn notify(&self) -> io::Result<()> {
        let one: u64 = 1;
        // SAFETY: writes exactly 8 bytes from a live u64.
        let n = unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                &one as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            // Counter saturated; the reader already has a wake pending.
            if err.kind() == io::ErrorKind::WouldBlock {
                return Ok(());
            }
            return Err(err);
        }
        Ok(())
    }

    /// Consume all pending wakes and return how many were coalesced.
    ///
    /// Returns 0 when nothing was pending.
    pub fn drain(&self) -> io::Result<u64> {
        let mut value: u64 = 0;
        // SAFETY: reads exactly 8 bytes into a live u64.
        let n = unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                &mut value as *mut u64 as *mut libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                return Ok(0);
            }
            return Err(err);
        }
        Ok(value)
    }
}

impl AsRawFd for Notifier {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

/// What `poll(2)` reported for one descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    /// Data can be read
    pub readable: bool,
    /// A socket error is pending (`POLLERR`); a read consumes it
    pub error: bool,
    /// The peer hung up or the descriptor is unusable (`POLLHUP`/`POLLNVAL`)
    pub hangup: bool,
}

impl Readiness {
    /// Anything to act on: data, a pending error or a hangup.
    pub fn is_ready(&self) -> bool {
        self.readable || self.error || self.hangup
    }
}

/// Block until at least one descriptor has an event or `timeout` elapses.
///
/// Returns one entry per input descriptor, in order. `None` waits forever.
/// An interrupted wait (`EINTR`) reports nothing ready.
pub fn poll_readiness(fds: &[RawFd], timeout: Option<Duration>) -> io::Result<Vec<Readiness>> {
    let mut pollfds: Vec<libc::pollfd> = fds
        .iter()
        .map(|&fd| libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        })
        .collect();

    let timeout_ms: libc::c_int = match timeout {
        None => -1,
        Some(d) => d.as_millis().min(libc::c_int::MAX as u128) as libc::c_int,
    };

    // SAFETY: `pollfds` is a live, correctly sized array for the whole call.
    let rc = unsafe {
        libc::poll(
            pollfds.as_mut_ptr(),
            pollfds.len() as libc::nfds_t,
            timeout_ms,
        )
    };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(vec![Readiness::default(); fds.len()]);
        }
        return Err(err);
    }

    Ok(pollfds
        .iter()
        .map(|p| Readiness {
            readable: p.revents & libc::POLLIN != 0,
            error: p.revents & libc::POLLERR != 0,
            hangup: p.revents & (libc::POLLHUP | libc::POLLNVAL) != 0,
        })
        .collect())
}

/// Block until at least one descriptor is ready or `timeout` elapses.
///
/// A descriptor counts as ready when it is readable, has a pending error or
/// was hung up; callers must act on it either way or `poll` keeps returning.
pub fn wait_readable(fds: &[RawFd], timeout: Option<Duration>) -> io::Result<Vec<bool>> {
    Ok(poll_readiness(fds, timeout)?
        .iter()
        .map(Readiness::is_ready)
        .collect())
}
