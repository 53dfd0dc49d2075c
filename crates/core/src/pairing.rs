// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The three pairing strategies.
//!
//! All of them share one rule: a record that already holds a pair link
//! answers any further pairing attempt with that pair's id, and its metadata
//! is frozen. The return convention is "returned id == request id means no
//! pair yet"; the dispatcher turns that into `NOPAIR`.

use std::time::Duration;

use tracing::debug;

use crate::clock::Clock;
use crate::context::{IpcContext, Waiter};
use crate::endpoint::{EndpointId, EndpointRecord, PeerAddr, WireTime};
use crate::error::ContextError;

/// How long a parked waiter stays eligible. A waiter strictly older than
/// this is silently discarded; at exactly the boundary it still pairs.
pub const WAITER_TTL: Duration = Duration::from_millis(100);

/// Maximum `|server.end - client.end|` accepted in strict matching mode.
const STRICT_END_DELTA_NANOS: i128 = 200_000;

impl<C: Clock> IpcContext<C> {
    /// Waiter-based rendezvous: pair with whoever shows up next.
    pub fn pair_kludge(&mut self, id: EndpointId) -> Result<EndpointId, ContextError> {
        let record = self.store.get(id).ok_or(ContextError::InvalidEndpoint(id.0))?;
        if let Some(pair) = record.pair {
            return Ok(pair);
        }

        // Expire a waiter nobody claimed in time.
        if let Some(waiter) = self.waiter {
            if self.clock.now().duration_since(waiter.since) > WAITER_TTL {
                debug!(waiter = %waiter.id, "discarding stale waiter");
                self.waiter = None;
            }
        }

        // A parked endpoint that another strategy paired meanwhile can no
        // longer be handed out: pair links are immutable until removal.
        if let Some(waiter) = self.waiter {
            if self.store.get(waiter.id).is_some_and(EndpointRecord::is_paired) {
                self.waiter = None;
            }
        }

        if let Some(waiter) = self.waiter {
            if waiter.id != id {
                self.link_pair(id, waiter.id);
                self.waiter = None;
                return Ok(waiter.id);
            }
        }

        self.waiter = Some(Waiter { id, since: self.clock.now() });
        Ok(id)
    }

    /// CRC-fingerprint pairing: match the first unpaired record whose
    /// `(send, recv)` fingerprint is the swap of this one's.
    pub fn crc_match(
        &mut self,
        id: EndpointId,
        send_crc: i64,
        recv_crc: i64,
        last_try: bool,
    ) -> Result<EndpointId, ContextError> {
        let record = self.store.get(id).ok_or(ContextError::InvalidEndpoint(id.0))?;
        if let Some(pair) = record.pair {
            return Ok(pair);
        }

        // Reject only when BOTH values changed; a single changed value is
        // accepted. Oddity preserved for compatibility.
        let meta = record.meta;
        if meta.has_crc() && send_crc != meta.send_crc && recv_crc != meta.recv_crc {
            return Err(ContextError::CrcChanged);
        }

        if let Some(record) = self.store.get_mut(id) {
            record.meta.send_crc = send_crc;
            record.meta.recv_crc = recv_crc;
        }

        let matched = self
            .store
            .iter()
            .find(|(other_id, other)| {
                *other_id != id
                    && !other.is_paired()
                    && other.meta.send_crc == recv_crc
                    && other.meta.recv_crc == send_crc
            })
            .map(|(other_id, _)| other_id);

        if let Some(matched) = matched {
            self.link_pair(id, matched);
            return Ok(matched);
        }

        if last_try {
            // Zero the fingerprint so a later partner cannot match this
            // abandoned attempt.
            if let Some(record) = self.store.get_mut(id) {
                record.meta.clear_crc();
            }
        }
        Ok(id)
    }

    /// Install address/timing metadata ahead of [`Self::find_pair`].
    pub fn endpoint_info(
        &mut self,
        id: EndpointId,
        src: PeerAddr,
        dst: PeerAddr,
        start: WireTime,
        end: WireTime,
        is_accept: bool,
    ) -> Result<(), ContextError> {
        let record = self.store.get_mut(id).ok_or(ContextError::InvalidEndpoint(id.0))?;
        if record.is_paired() {
            return Err(ContextError::InfoFrozen);
        }

        let meta = &mut record.meta;
        if meta.src.is_set() || meta.dst.is_set() {
            // Changed end times are deliberately accepted; the legacy daemon
            // never rejected them.
            if src != meta.src || dst != meta.dst || start != meta.start {
                return Err(ContextError::InfoChanged);
            }
        }

        meta.src = src;
        meta.dst = dst;
        meta.start = start;
        meta.end = end;
        meta.is_accept = is_accept;
        Ok(())
    }

    /// Full-metadata pairing: unique address/timing candidate, then CRC
    /// crossover confirmation.
    pub fn find_pair(
        &mut self,
        id: EndpointId,
        send_crc: i64,
        recv_crc: i64,
        last_try: bool,
    ) -> Result<EndpointId, ContextError> {
        let record = self.store.get(id).ok_or(ContextError::InvalidEndpoint(id.0))?;
        if let Some(pair) = record.pair {
            return Ok(pair);
        }

        let meta = record.meta;
        if meta.has_crc() && send_crc != meta.send_crc && recv_crc != meta.recv_crc {
            return Err(ContextError::CrcChanged);
        }
        if !meta.src.is_set() || !meta.dst.is_set() {
            return Err(ContextError::MissingInfo);
        }

        if let Some(record) = self.store.get_mut(id) {
            record.meta.send_crc = send_crc;
            record.meta.recv_crc = recv_crc;
        }

        let strict = self.config.strict_end_delta;
        let candidates: Vec<EndpointId> = {
            let this = match self.store.get(id) {
                Some(record) => record,
                None => return Err(ContextError::InvalidEndpoint(id.0)),
            };
            self.store
                .iter()
                .filter(|(other_id, other)| {
                    *other_id != id && meta_matches(this, other, strict)
                })
                .map(|(other_id, _)| other_id)
                .collect()
        };

        if candidates.len() > 1 {
            return Err(ContextError::TooManyMatches);
        }

        if let Some(&candidate) = candidates.first() {
            let duplicate = {
                let matched = match self.store.get(candidate) {
                    Some(record) => record,
                    None => return Err(ContextError::InvalidEndpoint(candidate.0)),
                };
                self.store.iter().any(|(other_id, other)| {
                    other_id != id
                        && other_id != candidate
                        && meta_matches(matched, other, strict)
                })
            };
            if duplicate {
                return Err(ContextError::DupDetected);
            }

            let crc_crossed = self.store.get(candidate).is_some_and(|matched| {
                matched.meta.send_crc == recv_crc && matched.meta.recv_crc == send_crc
            });
            if crc_crossed {
                self.link_pair(id, candidate);
                return Ok(candidate);
            }
            // Unique address match but the fingerprints disagree: no pair.
        }

        if last_try {
            // Erase the pairing metadata so this abandoned endpoint cannot
            // be matched retroactively.
            if let Some(record) = self.store.get_mut(id) {
                record.meta.clear_crc();
                record.meta.clear_addrs();
            }
        }
        Ok(id)
    }
}

/// The address/timing match predicate (CRC is checked separately).
///
/// Treating the non-acceptor as client and the acceptor as server, the
/// connect window must overlap the accept window and the addresses must
/// cross over. Symmetric in its arguments.
fn meta_matches(x: &EndpointRecord, y: &EndpointRecord, strict: bool) -> bool {
    if !x.meta.src.is_set() || !y.meta.src.is_set() {
        return false;
    }
    if x.is_paired() || y.is_paired() {
        return false;
    }
    if x.meta.is_accept == y.meta.is_accept {
        return false;
    }
    if x.meta.src != y.meta.dst || x.meta.dst != y.meta.src {
        return false;
    }

    let (client, server) = if x.meta.is_accept { (&y.meta, &x.meta) } else { (&x.meta, &y.meta) };
    if client.start > server.end || server.start > client.end {
        return false;
    }
    if strict {
        let delta = (server.end.as_nanos() - client.end.as_nanos()).abs();
        if delta > STRICT_END_DELTA_NANOS {
            return false;
        }
    }
    true
}

#[cfg(test)]
#[path = "pairing_tests.rs"]
mod tests;
