// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;

/// Path of the listening socket: `IPCD_SOCKET_PATH`, default `/tmp/ipcd.sock`.
pub fn socket_path() -> PathBuf {
    std::env::var("IPCD_SOCKET_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp/ipcd.sock"))
}

/// Path of the singleton lock/PID file: `IPCD_LOCK_PATH`, default
/// `/tmp/ipcd.pid`.
pub fn lock_path() -> PathBuf {
    std::env::var("IPCD_LOCK_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp/ipcd.pid"))
}

/// Optional log file path (`IPCD_LOG_PATH`). When unset, logs go to stderr.
pub fn log_path() -> Option<PathBuf> {
    std::env::var("IPCD_LOG_PATH").ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

/// Whether full-metadata pairing additionally enforces the 200us end-time
/// delta (`IPCD_STRICT_PAIR_WINDOW` set to anything non-empty).
pub fn strict_pair_window() -> bool {
    std::env::var("IPCD_STRICT_PAIR_WINDOW").is_ok_and(|s| !s.is_empty())
}
