//! Namespace-pinned sender thread.
//!
//! `setns(CLONE_NEWNET)` rebinds the calling thread only, so the
//! sender is a dedicated OS thread, never a runtime task: it joins the
//! target namespace as its very first action, opens its send socket
//! there, and stays pinned for the life of the process. Setup failures
//! are reported back to the supervising task over a channel; the
//! thread cannot make progress without its socket, and the process
//! exits.

use std::fs::File;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::sync::Arc;
use std::thread;
use thiserror::Error;
use tokio::sync::mpsc;
use ueventfw_protocol::{MonitorGroup, encode_monitor, sockaddr};

use crate::monitor::open_uevent_socket;
use crate::queue::EventQueue;

/// Fatal sender-side failures. Any of these terminates the process.
#[derive(Debug, Error)]
pub enum SenderError {
    /// `setns` into the target network namespace failed.
    #[error("failed to join target network namespace")]
    JoinNamespace(#[source] io::Error),

    /// Creating the uevent socket inside the target namespace failed.
    #[error("failed to open send socket in target namespace")]
    OpenSocket(#[source] io::Error),
}

/// Spawn the sender thread.
///
/// `netns` is the opened namespace handle; `fatal` carries setup
/// failures back to the supervising task. The thread never exits on
/// its own once set up.
pub fn spawn(
    netns: File,
    queue: Arc<EventQueue>,
    fatal: mpsc::UnboundedSender<SenderError>,
) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("ns-sender".to_string())
        .spawn(move || run(netns, &queue, &fatal))
}

fn run(netns: File, queue: &EventQueue, fatal: &mpsc::UnboundedSender<SenderError>) {
    // Must precede socket creation: the socket is scoped to whichever
    // namespace this thread is in when it opens.
    if let Err(err) = join_netns(&netns) {
        let _ = fatal.send(SenderError::JoinNamespace(err));
        return;
    }
    drop(netns);

    let socket = match open_uevent_socket() {
        Ok(socket) => socket,
        Err(err) => {
            let _ = fatal.send(SenderError::OpenSocket(err));
            return;
        }
    };

    tracing::info!("sender bound to target namespace");

    // Forwarded messages go to the group udev listeners subscribe to.
    let dest = sockaddr(MonitorGroup::UDEV);
    let mut forwarded: u64 = 0;
    let mut dropped: u64 = 0;

    loop {
        for event in queue.drain_blocking() {
            let message = encode_monitor(&event);
            match send_datagram(&socket, &message, &dest) {
                Ok(()) => {
                    forwarded += 1;
                    tracing::trace!(bytes = message.len(), forwarded, "forwarded event");
                }
                Err(err) => {
                    // Not retried; the event is dropped either way.
                    dropped += 1;
                    tracing::warn!(error = %err, dropped, "failed to forward event");
                }
            }
        }
    }
}

fn join_netns(netns: &File) -> io::Result<()> {
    let rc = unsafe { libc::setns(netns.as_raw_fd(), libc::CLONE_NEWNET) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn send_datagram(socket: &OwnedFd, message: &[u8], dest: &libc::sockaddr_nl) -> io::Result<()> {
    let rc = unsafe {
        libc::sendto(
            socket.as_raw_fd(),
            message.as_ptr().cast(),
            message.len(),
            0,
            dest as *const libc::sockaddr_nl as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
        )
    };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
