// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The IPC context: registry, lifecycle, and localization operations.
//!
//! All operations are synchronous and atomic with respect to each other;
//! the daemon wraps the context in one mutex and never holds it across
//! blocking I/O.

use std::collections::HashMap;
use std::os::fd::OwnedFd;
use std::time::Instant;

use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::endpoint::{Endpoint, EndpointId, EndpointRecord};
use crate::error::ContextError;
use crate::local::{Localization, LocalizationId};
use crate::store::EndpointStore;

/// Tunables for the full-metadata pairing strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct PairingConfig {
    /// Additionally require `|server.end - client.end| <= 200us` when
    /// matching on address/timing metadata.
    pub strict_end_delta: bool,
}

/// The endpoint currently parked for waiter-based pairing.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Waiter {
    pub id: EndpointId,
    pub since: Instant,
}

pub struct IpcContext<C: Clock = SystemClock> {
    pub(crate) store: EndpointStore,
    localizations: HashMap<LocalizationId, Localization>,
    next_localization: u64,
    pub(crate) waiter: Option<Waiter>,
    pub(crate) clock: C,
    pub(crate) config: PairingConfig,
}

impl IpcContext<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    pub fn with_config(config: PairingConfig) -> Self {
        let mut ctx = Self::new();
        ctx.config = config;
        ctx
    }
}

impl Default for IpcContext<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> IpcContext<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            store: EndpointStore::new(),
            localizations: HashMap::new(),
            next_localization: 0,
            waiter: None,
            clock,
            config: PairingConfig::default(),
        }
    }

    /// Number of live registrations.
    pub fn endpoint_count(&self) -> usize {
        self.store.len()
    }

    /// Register a socket endpoint and return its fresh id.
    ///
    /// Duplicate `(pid, fd)` claims are accepted: the same pair legitimately
    /// reappears when a client forks.
    pub fn register(&mut self, pid: i32, fd: i32) -> EndpointId {
        let id = self.store.insert(EndpointRecord::new(Endpoint { pid, fd }));
        debug!(%id, pid, fd, "registered endpoint");
        id
    }

    /// Take an additional reference on `id`.
    ///
    /// The pid/fd arguments are accepted for future credential checks and
    /// currently ignored.
    pub fn reregister(&mut self, id: EndpointId, _pid: i32, _fd: i32) -> Result<(), ContextError> {
        let record =
            self.store.get_mut(id).ok_or(ContextError::InvalidEndpoint(id.0))?;
        record.refcount += 1;
        debug!(%id, refcount = record.refcount, "reregistered endpoint");
        Ok(())
    }

    /// Drop one reference on `id`; the record is removed when none remain.
    pub fn unregister(&mut self, id: EndpointId) -> Result<(), ContextError> {
        let record = self.store.get_mut(id).ok_or(ContextError::InvalidEndpoint(id.0))?;
        record.refcount -= 1;
        if record.refcount > 0 {
            debug!(%id, refcount = record.refcount, "unregistered reference");
            return Ok(());
        }
        self.purge(id);
        Ok(())
    }

    /// Remove every registration owned by `pid`, regardless of refcount.
    /// Returns the number of records removed.
    pub fn removeall(&mut self, pid: i32) -> usize {
        let victims: Vec<EndpointId> = self
            .store
            .iter()
            .filter(|(_, record)| record.endpoint.pid == pid)
            .map(|(id, _)| id)
            .collect();

        for id in &victims {
            self.purge(*id);
        }
        debug!(pid, removed = victims.len(), "removed all endpoints for pid");
        victims.len()
    }

    /// Declare `local` and `remote` the two ends of one connection and
    /// manufacture their local socket pair.
    pub fn localize(
        &mut self,
        local: EndpointId,
        remote: EndpointId,
    ) -> Result<(), ContextError> {
        if !self.store.contains(local) {
            return Err(ContextError::InvalidLocalId(local.0));
        }
        if !self.store.contains(remote) {
            return Err(ContextError::InvalidRemoteId(remote.0));
        }
        let lloc = self.store.get(local).and_then(|r| r.localization);
        let rloc = self.store.get(remote).and_then(|r| r.localization);

        match (lloc, rloc) {
            // Already localized together; nothing to do.
            (Some(a), Some(b)) if a == b => Ok(()),
            (None, None) => {
                let localization = Localization::create(local, remote)?;
                let lid = LocalizationId(self.next_localization);
                self.next_localization += 1;
                self.localizations.insert(lid, localization);
                if let Some(record) = self.store.get_mut(local) {
                    record.localization = Some(lid);
                }
                if let Some(record) = self.store.get_mut(remote) {
                    record.localization = Some(lid);
                }
                debug!(%local, %remote, localization = %lid, "localized endpoint pair");
                Ok(())
            }
            _ => Err(ContextError::AlreadyLocalized),
        }
    }

    /// Move the local descriptor belonging to `id` out of the context.
    ///
    /// The caller owns the descriptor from here on; the daemon transfers it
    /// to the client and drops its copy.
    pub fn take_local_fd(&mut self, id: EndpointId) -> Result<OwnedFd, ContextError> {
        let record = self.store.get(id).ok_or(ContextError::InvalidEndpoint(id.0))?;
        let lid = record.localization.ok_or(ContextError::NotLocalized)?;
        let localization =
            self.localizations.get_mut(&lid).ok_or(ContextError::SlotMismatch)?;
        localization.take_fd(id)
    }

    /// Link two records as an established pair. Both must be live.
    pub(crate) fn link_pair(&mut self, x: EndpointId, y: EndpointId) {
        if let Some(record) = self.store.get_mut(x) {
            record.pair = Some(y);
        }
        if let Some(record) = self.store.get_mut(y) {
            record.pair = Some(x);
        }
        debug!(%x, %y, "paired endpoints");
    }

    /// Remove `id` and tear down everything that references it: the waiter
    /// slot, the partner's pair link, and the daemon's copies of its
    /// localization descriptors. The localization record itself survives
    /// until its other owner is gone.
    fn purge(&mut self, id: EndpointId) {
        let Some(record) = self.store.remove(id) else {
            return;
        };

        if self.waiter.is_some_and(|w| w.id == id) {
            self.waiter = None;
        }

        // Unlink the partner so the released id cannot be captured by a
        // later registration that reuses it.
        if let Some(partner) = record.pair {
            if let Some(partner_record) = self.store.get_mut(partner) {
                partner_record.pair = None;
            }
        }

        if let Some(lid) = record.localization {
            if let Some(localization) = self.localizations.get_mut(&lid) {
                localization.close_both();
                let partner_live = localization
                    .partner_of(id)
                    .is_some_and(|partner| self.store.contains(partner));
                if !partner_live {
                    self.localizations.remove(&lid);
                }
            }
        }
        debug!(%id, "purged endpoint");
    }

    #[cfg(test)]
    pub(crate) fn localization_count(&self) -> usize {
        self.localizations.len()
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
