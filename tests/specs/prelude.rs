// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the daemon specs.

use std::io::{BufRead, BufReader, IoSliceMut, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::time::{Duration, Instant};

use nix::sys::socket::{recvmsg, ControlMessageOwned, MsgFlags, UnixAddr};
use tempfile::TempDir;

pub const SPEC_WAIT_MAX_MS: u64 = 5_000;

/// Poll `cond` until it holds or `max_ms` elapses.
pub fn wait_for(max_ms: u64, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(max_ms);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    cond()
}

/// A running `ipcd` process on a private socket. Killed on drop.
pub struct Daemon {
    child: Child,
    // Held for its Drop: removes the socket directory.
    _dir: TempDir,
    socket: PathBuf,
    lock: PathBuf,
}

impl Daemon {
    pub fn start() -> Self {
        Self::start_with_env(&[])
    }

    pub fn start_with_env(extra: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("ipcd.sock");
        let lock = dir.path().join("ipcd.pid");

        let mut cmd = Command::new(assert_cmd::cargo::cargo_bin("ipcd"));
        cmd.env("IPCD_SOCKET_PATH", &socket).env("IPCD_LOCK_PATH", &lock);
        for (key, value) in extra {
            cmd.env(key, value);
        }
        let child = cmd.spawn().expect("failed to spawn ipcd");

        let daemon = Self { child, _dir: dir, socket, lock };
        assert!(
            wait_for(SPEC_WAIT_MAX_MS, || daemon.socket.exists()),
            "daemon socket never appeared"
        );
        daemon
    }

    pub fn connect(&self) -> Client {
        Client::connect(&self.socket)
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// A line-protocol client connection.
pub struct Client {
    reader: BufReader<UnixStream>,
}

impl Client {
    pub fn connect(path: &Path) -> Self {
        let stream = UnixStream::connect(path).expect("failed to connect to ipcd");
        Self { reader: BufReader::new(stream) }
    }

    /// Send one request line and return the reply line.
    pub fn request(&mut self, line: &str) -> String {
        self.reader.get_mut().write_all(format!("{line}\n").as_bytes()).unwrap();
        let mut reply = String::new();
        self.reader.read_line(&mut reply).unwrap();
        reply.trim_end_matches('\n').to_string()
    }

    /// Send one request line and assert the exact reply.
    pub fn check(&mut self, line: &str, expected: &str) {
        let reply = self.request(line);
        assert_eq!(reply, expected, "unexpected reply to {line:?}");
    }

    /// `GETLOCALFD` happy path: returns the transferred descriptor.
    pub fn get_local_fd(&mut self, id: i32) -> OwnedFd {
        self.reader.get_mut().write_all(format!("GETLOCALFD {id}\n").as_bytes()).unwrap();
        let fd = recv_fd(self.reader.get_ref());
        let mut reply = String::new();
        self.reader.read_line(&mut reply).unwrap();
        assert_eq!(reply.trim_end_matches('\n'), "200 OK");
        fd
    }
}

/// Receive one descriptor from the ancillary data of the next message.
fn recv_fd(stream: &UnixStream) -> OwnedFd {
    let mut payload = [0u8; 1];
    let mut cmsg_buffer = nix::cmsg_space!([RawFd; 1]);
    let mut iov = [IoSliceMut::new(&mut payload)];
    let msg = recvmsg::<UnixAddr>(
        stream.as_raw_fd(),
        &mut iov,
        Some(&mut cmsg_buffer),
        MsgFlags::empty(),
    )
    .expect("recvmsg failed");

    for cmsg in msg.cmsgs().expect("cmsgs failed") {
        if let ControlMessageOwned::ScmRights(fds) = cmsg {
            if let Some(&fd) = fds.first() {
                // Ownership transfers to us with the message.
                return unsafe { OwnedFd::from_raw_fd(fd) };
            }
        }
    }
    panic!("no descriptor in ancillary data");
}
