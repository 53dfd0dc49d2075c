// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Endpoint identity and per-endpoint registry records.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

use crate::local::LocalizationId;

/// Externally-visible endpoint identifier.
///
/// Ids are dense from 0 with smallest-hole-first reuse; the allocator lives
/// in [`crate::EndpointStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointId(pub i32);

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A socket inside a client process, as claimed by the client.
///
/// The daemon trusts the claim. Duplicate `(pid, fd)` registrations are
/// legal (the same pair can legitimately reappear after a fork), so this is
/// identity metadata, never a lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub pid: i32,
    pub fd: i32,
}

/// One end of a network flow: IP plus port, `port == -1` meaning "unset".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAddr {
    pub ip: IpAddr,
    pub port: i32,
}

impl PeerAddr {
    pub const UNSET: PeerAddr = PeerAddr { ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: -1 };

    pub fn new(ip: IpAddr, port: i32) -> Self {
        Self { ip, port }
    }

    /// Whether this address carries real information (sentinel port is -1).
    pub fn is_set(&self) -> bool {
        self.port != -1
    }
}

impl Default for PeerAddr {
    fn default() -> Self {
        Self::UNSET
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Wall-clock timestamp as reported by clients: seconds plus nanoseconds.
///
/// Ordering is lexicographic on `(sec, nsec)`, which is correct for
/// normalized values (`0 <= nsec < 1e9`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct WireTime {
    pub sec: i64,
    pub nsec: i64,
}

impl WireTime {
    pub fn new(sec: i64, nsec: i64) -> Self {
        Self { sec, nsec }
    }

    /// Total nanoseconds, for delta comparisons.
    pub fn as_nanos(&self) -> i128 {
        self.sec as i128 * 1_000_000_000 + self.nsec as i128
    }
}

/// Pairing metadata installed by the metadata-bearing commands.
///
/// Zero is both a legal CRC and the "unset" sentinel; a zero/zero fingerprint
/// can therefore cross-match another zero/zero fingerprint. Known deficiency,
/// preserved for wire compatibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PairMeta {
    pub send_crc: i64,
    pub recv_crc: i64,
    pub src: PeerAddr,
    pub dst: PeerAddr,
    pub start: WireTime,
    pub end: WireTime,
    pub is_accept: bool,
}

impl PairMeta {
    /// Whether any CRC fingerprint has been stored.
    pub fn has_crc(&self) -> bool {
        self.send_crc != 0 || self.recv_crc != 0
    }

    /// Forget the CRC fingerprint (the "give up" path).
    pub fn clear_crc(&mut self) {
        self.send_crc = 0;
        self.recv_crc = 0;
    }

    /// Forget the address information (the full-metadata "give up" path).
    pub fn clear_addrs(&mut self) {
        self.src = PeerAddr::UNSET;
        self.dst = PeerAddr::UNSET;
    }
}

/// A live registration in the registry.
#[derive(Debug)]
pub struct EndpointRecord {
    pub endpoint: Endpoint,
    /// >= 1 while live; incremented by reregister, decremented by unregister.
    pub refcount: u32,
    /// Shared localization record, if this endpoint has been localized.
    pub localization: Option<LocalizationId>,
    /// Established match, symmetric with the partner record.
    pub pair: Option<EndpointId>,
    pub meta: PairMeta,
}

impl EndpointRecord {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint, refcount: 1, localization: None, pair: None, meta: PairMeta::default() }
    }

    pub fn is_paired(&self) -> bool {
        self.pair.is_some()
    }
}

#[cfg(test)]
#[path = "endpoint_tests.rs"]
mod tests;
