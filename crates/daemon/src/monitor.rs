//! Uevent capture: netlink monitor socket and the async capture loop.
//!
//! The monitor binds a raw `NETLINK_KOBJECT_UEVENT` socket to a
//! multicast group in the namespace the daemon starts in. The capture
//! loop multiplexes on it through the tokio reactor and pushes each
//! decoded event onto the hand-off queue.

use color_eyre::eyre::{Result, WrapErr};
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;
use tokio::io::unix::AsyncFd;
use ueventfw_protocol::{
    DeviceEvent, KOBJECT_UEVENT, MonitorGroup, is_monitor_datagram, parse_monitor, sockaddr,
};

use crate::queue::EventQueue;

/// Largest datagram the uevent family delivers; matches libudev's
/// receive buffer.
const RECV_BUF_LEN: usize = 8192;

/// A raw uevent monitor socket subscribed to one multicast group.
pub struct UeventMonitor {
    fd: OwnedFd,
    group: MonitorGroup,
}

impl UeventMonitor {
    /// Open a non-blocking, close-on-exec uevent socket and subscribe
    /// to `group` in the current network namespace.
    pub fn open(group: MonitorGroup) -> io::Result<Self> {
        let fd = open_uevent_socket()?;

        let addr = sockaddr(group);
        let rc = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                &addr as *const libc::sockaddr_nl as *const libc::sockaddr,
                std::mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self { fd, group })
    }

    /// Receive one datagram and decode it.
    ///
    /// Returns `Ok(None)` for datagrams that carry no forwardable
    /// event: spoofed kernel-group traffic from userspace processes
    /// and payloads that decode as neither wire format. I/O errors
    /// (including `EAGAIN` and `EINTR`) are returned to the caller.
    pub fn receive(&self) -> io::Result<Option<DeviceEvent>> {
        let mut buf = [0u8; RECV_BUF_LEN];
        let mut src: libc::sockaddr_nl = unsafe { std::mem::zeroed() };
        let mut src_len = std::mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t;

        let n = unsafe {
            libc::recvfrom(
                self.fd.as_raw_fd(),
                buf.as_mut_ptr().cast(),
                buf.len(),
                0,
                &mut src as *mut libc::sockaddr_nl as *mut libc::sockaddr,
                &mut src_len,
            )
        };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        let datagram = &buf[..n as usize];

        // Kernel uevents always originate from pid 0; anything else on
        // the kernel group is a userspace impostor.
        if self.group.contains(MonitorGroup::KERNEL) && src.nl_pid != 0 {
            tracing::debug!(pid = src.nl_pid, "ignoring non-kernel sender");
            return Ok(None);
        }

        let decoded = if is_monitor_datagram(datagram) {
            parse_monitor(datagram)
        } else {
            DeviceEvent::parse_kernel(datagram)
        };

        match decoded {
            Ok(event) => Ok(Some(event)),
            Err(err) => {
                tracing::debug!(error = %err, len = datagram.len(), "ignoring undecodable datagram");
                Ok(None)
            }
        }
    }
}

impl AsRawFd for UeventMonitor {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

/// Open an unbound raw uevent socket in the current namespace.
pub(crate) fn open_uevent_socket() -> io::Result<OwnedFd> {
    let raw = unsafe {
        libc::socket(
            libc::PF_NETLINK,
            libc::SOCK_RAW | libc::SOCK_CLOEXEC | libc::SOCK_NONBLOCK,
            KOBJECT_UEVENT,
        )
    };
    if raw < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: raw is a freshly created fd we own exclusively.
    Ok(unsafe { OwnedFd::from_raw_fd(raw) })
}

/// The event capture loop: readiness-multiplexed receive, one event
/// pushed per decoded datagram.
pub struct CaptureLoop {
    monitor: AsyncFd<UeventMonitor>,
    queue: Arc<EventQueue>,
}

impl CaptureLoop {
    /// Register the monitor socket with the runtime's reactor.
    pub fn new(monitor: UeventMonitor, queue: Arc<EventQueue>) -> io::Result<Self> {
        Ok(Self {
            monitor: AsyncFd::new(monitor)?,
            queue,
        })
    }

    /// Run forever. Returns only on a fatal multiplexing or receive
    /// error; transient interruptions are retried.
    pub async fn run(self) -> Result<()> {
        loop {
            let mut guard = self
                .monitor
                .readable()
                .await
                .wrap_err("failed waiting for uevent readiness")?;

            match guard.try_io(|inner| inner.get_ref().receive()) {
                Ok(Ok(Some(event))) => {
                    tracing::trace!(
                        subsystem = event.subsystem.as_deref(),
                        properties = event.properties.len(),
                        queued = self.queue.len(),
                        "captured event"
                    );
                    self.queue.push(event);
                }
                // Datagram carried nothing forwardable.
                Ok(Ok(None)) => {}
                Ok(Err(err)) if err.kind() == io::ErrorKind::Interrupted => {}
                Ok(Err(err)) => {
                    return Err(err).wrap_err("failed to receive uevent");
                }
                // Readiness was stale; re-await.
                Err(_would_block) => {}
            }
        }
    }
}
