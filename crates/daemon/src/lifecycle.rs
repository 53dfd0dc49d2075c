// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: configuration, singleton lock, startup, shutdown.

use std::fs::{File, OpenOptions, Permissions};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use fs2::FileExt;
use ipcd_core::PairingConfig;
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::info;

use crate::env;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the listening socket
    pub socket_path: PathBuf,
    /// Path of the lock/PID file
    pub lock_path: PathBuf,
    /// Pairing-engine tunables
    pub pairing: PairingConfig,
}

impl Config {
    /// Load configuration from the environment (see [`crate::env`]).
    pub fn load() -> Self {
        Self {
            socket_path: env::socket_path(),
            lock_path: env::lock_path(),
            pairing: PairingConfig { strict_end_delta: env::strict_pair_window() },
        }
    }
}

/// Errors from daemon startup.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Unable to lock {0}, ipcd already running?")]
    LockFailed(PathBuf),

    #[error("Failed to bind {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Live daemon resources. The lock file is held for the daemon's lifetime;
/// dropping this releases it.
#[derive(Debug)]
pub struct DaemonState {
    config: Config,
    // NOTE(lifetime): held to maintain the exclusive lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
}

impl DaemonState {
    /// Remove the socket and lock files on orderly shutdown.
    pub fn shutdown(self) {
        let _ = std::fs::remove_file(&self.config.socket_path);
        let _ = std::fs::remove_file(&self.config.lock_path);
        info!("ipcd shut down");
    }
}

/// Result of daemon startup: state plus the bound listener.
#[derive(Debug)]
pub struct StartupResult {
    pub daemon: DaemonState,
    pub listener: UnixListener,
}

/// Start the daemon: lock, bind, open up the socket.
///
/// Must run inside a tokio runtime (the listener registers with the
/// reactor).
pub fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config) {
        Ok(result) => Ok(result),
        Err(e) => {
            // Don't clean up if we failed to acquire the lock;
            // those files belong to the already-running daemon.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    // 1. Acquire the lock FIRST - prevents races with a running daemon.
    // Open without truncating so a failed attempt can't wipe the running
    // daemon's PID.
    let lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|_| LifecycleError::LockFailed(config.lock_path.clone()))?;

    // Write our PID now that we hold the lock.
    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 2. Remove a stale socket left by a crashed daemon and bind.
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    // 3. Open the socket to all local clients.
    std::fs::set_permissions(&config.socket_path, Permissions::from_mode(0o777))?;

    info!(socket = %config.socket_path.display(), "ipcd listening");

    Ok(StartupResult { daemon: DaemonState { config: config.clone(), lock_file }, listener })
}

/// Clean up partially-created files on startup failure.
fn cleanup_on_failure(config: &Config) {
    if config.socket_path.exists() {
        let _ = std::fs::remove_file(&config.socket_path);
    }
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
