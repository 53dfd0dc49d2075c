// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! Accepts connections and spawns one task per client. Each task reads one
//! request line at a time, performs exactly one serialized core operation,
//! and writes exactly one reply line. The dispatcher is stateless: a
//! connection may issue requests about any endpoint, and disconnecting
//! performs no cleanup; registrations persist until explicitly removed.

use std::io;
use std::sync::Arc;

use ipcd_core::{ContextError, EndpointId, IpcContext};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, warn};

use crate::passfd;
use crate::protocol::{Request, Response};

/// The serialized core: every operation runs under this one lock.
pub type SharedContext = Arc<Mutex<IpcContext>>;

/// Listener task for accepting socket connections.
pub struct Listener {
    unix: UnixListener,
    ctx: SharedContext,
}

impl Listener {
    pub fn new(unix: UnixListener, ctx: SharedContext) -> Self {
        Self { unix, ctx }
    }

    /// Run the accept loop, spawning a task per connection. Accept failures
    /// are logged and the loop continues.
    pub async fn run(self) {
        loop {
            match self.unix.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        match handle_connection(stream, ctx).await {
                            Ok(()) => debug!("client disconnected"),
                            Err(e) => warn!("connection error: {}", e),
                        }
                    });
                }
                Err(e) => error!("accept error: {}", e),
            }
        }
    }
}

/// Serve one client: read a line, dispatch, reply, repeat until EOF.
async fn handle_connection(mut stream: UnixStream, ctx: SharedContext) -> io::Result<()> {
    let (read_half, mut write_half) = stream.split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok(());
        }
        let request_line = line.trim_end_matches('\n');
        debug!(line = request_line, "received request");

        let response = dispatch(request_line, &ctx, write_half.as_ref()).await;
        write_half.write_all(format!("{response}\n").as_bytes()).await?;
    }
}

/// Parse one request line and perform its core operation.
///
/// `stream` is the requesting connection, used as the out-of-band channel
/// for `GETLOCALFD`. The core lock is never held across the transfer.
async fn dispatch(line: &str, ctx: &SharedContext, stream: &UnixStream) -> Response {
    let request = match Request::parse(line) {
        Ok(request) => request,
        Err(e) => return e.into(),
    };

    match request {
        Request::Register { pid, fd } => Response::Id(ctx.lock().register(pid, fd)),

        Request::Reregister { id, pid, fd } => ok_reply(ctx.lock().reregister(id, pid, fd)),

        Request::Unregister { id } => ok_reply(ctx.lock().unregister(id)),

        Request::RemoveAll { pid } => Response::Removed(ctx.lock().removeall(pid)),

        Request::Localize { local, remote } => ok_reply(ctx.lock().localize(local, remote)),

        Request::GetLocalFd { id } => {
            // Take the descriptor under the lock, transfer it without.
            let taken = { ctx.lock().take_local_fd(id) };
            match taken {
                Ok(fd) => match passfd::send_fd(stream, fd).await {
                    Ok(()) => Response::Ok,
                    Err(e) => {
                        warn!(%id, "descriptor transfer failed: {}", e);
                        Response::Error { code: 303, message: format!("FD transfer failed: {e}") }
                    }
                },
                Err(e) => e.into(),
            }
        }

        Request::EndpointKludge { id } => pair_reply(id, ctx.lock().pair_kludge(id)),

        Request::ThreshCrcKludge { id, send_crc, recv_crc, last_try } => {
            pair_reply(id, ctx.lock().crc_match(id, send_crc, recv_crc, last_try))
        }

        Request::EndpointInfo { id, src, dst, start, end, is_accept } => {
            ok_reply(ctx.lock().endpoint_info(id, src, dst, start, end, is_accept))
        }

        Request::FindPair { id, send_crc, recv_crc, last_try } => {
            pair_reply(id, ctx.lock().find_pair(id, send_crc, recv_crc, last_try))
        }
    }
}

fn ok_reply(result: Result<(), ContextError>) -> Response {
    match result {
        Ok(()) => Response::Ok,
        Err(e) => e.into(),
    }
}

fn pair_reply(id: EndpointId, result: Result<EndpointId, ContextError>) -> Response {
    match result {
        Ok(returned) => Response::pair_reply(id, returned),
        Err(e) => e.into(),
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
