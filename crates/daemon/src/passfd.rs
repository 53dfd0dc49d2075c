// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Descriptor transfer over a connected Unix stream socket.
//!
//! One descriptor per message, carried as `SCM_RIGHTS` ancillary data on a
//! single payload byte. The payload byte keeps the message visible to plain
//! `read` calls; the receiver consumes it together with the descriptor.

use std::io::{self, IoSlice, IoSliceMut};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use nix::cmsg_space;
use nix::sys::socket::{
    recvmsg, sendmsg, ControlMessage, ControlMessageOwned, MsgFlags, UnixAddr,
};
use tokio::io::Interest;
use tokio::net::UnixStream;

/// Send one descriptor to the peer of `stream`.
///
/// Takes ownership: the kernel duplicates the descriptor into the receiving
/// process during the send, and our copy closes when `fd` drops, on the
/// success path and on every error path.
pub async fn send_fd(stream: &UnixStream, fd: OwnedFd) -> io::Result<()> {
    loop {
        stream.writable().await?;
        let result = stream.try_io(Interest::WRITABLE, || {
            let fds = [fd.as_raw_fd()];
            let cmsg = ControlMessage::ScmRights(&fds);
            let iov = [IoSlice::new(&[0u8])];
            sendmsg::<UnixAddr>(stream.as_raw_fd(), &iov, &[cmsg], MsgFlags::empty(), None)
                .map(drop)
                .map_err(io::Error::from)
        });
        match result {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Receive one descriptor from the peer of `stream`.
///
/// Returns the raw descriptor; the caller takes ownership and is responsible
/// for closing it.
pub async fn recv_fd(stream: &UnixStream) -> io::Result<RawFd> {
    loop {
        stream.readable().await?;
        let result = stream.try_io(Interest::READABLE, || {
            let mut payload = [0u8; 1];
            let mut cmsg_buffer = cmsg_space!([RawFd; 1]);
            let mut iov = [IoSliceMut::new(&mut payload)];
            let msg = recvmsg::<UnixAddr>(
                stream.as_raw_fd(),
                &mut iov,
                Some(&mut cmsg_buffer),
                MsgFlags::empty(),
            )
            .map_err(io::Error::from)?;

            for cmsg in msg.cmsgs().map_err(io::Error::from)? {
                if let ControlMessageOwned::ScmRights(fds) = cmsg {
                    if let Some(&fd) = fds.first() {
                        return Ok(fd);
                    }
                }
            }
            Err(io::Error::new(io::ErrorKind::InvalidData, "no descriptor in ancillary data"))
        });
        match result {
            Ok(fd) => return Ok(fd),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
#[path = "passfd_tests.rs"]
mod tests;
