// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ipcd: the endpoint localization daemon.
//!
//! Registers client socket endpoints, pairs the two ends of a local
//! connection, and hands each side one end of a directly-connected socket
//! pair.

use std::sync::Arc;

use ipcd_daemon::listener::{Listener, SharedContext};
use ipcd_daemon::{env, lifecycle, Config};
use ipcd_core::IpcContext;
use parking_lot::Mutex;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _log_guard = init_tracing();

    let config = Config::load();
    let startup = match lifecycle::startup(&config) {
        Ok(startup) => startup,
        Err(e) => {
            error!("startup failed: {}", e);
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let ctx: SharedContext = Arc::new(Mutex::new(IpcContext::with_config(config.pairing)));
    let listener = Listener::new(startup.listener, ctx);

    tokio::select! {
        () = listener.run() => {}
        () = shutdown_signal() => {
            info!("shutdown signal received");
        }
    }

    startup.daemon.shutdown();
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            warn!("failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = term.recv() => {}
    }
}

/// Set up tracing: stderr by default, a log file when `IPCD_LOG_PATH` is set.
///
/// The returned guard must stay alive for the process lifetime so buffered
/// log lines are flushed.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match env::log_path() {
        Some(path) => {
            let directory = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("ipcd.log"));
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        }
    }
}
