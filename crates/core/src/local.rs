// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Localization records: a connected local socket pair shared by two
//! paired endpoints.

use std::fmt;
use std::os::fd::OwnedFd;

use nix::sys::socket::{socketpair, AddressFamily, SockFlag, SockType};

use crate::endpoint::EndpointId;
use crate::error::ContextError;

/// Key of a [`Localization`] in the context's localization table. Both
/// endpoint records of a localized pair carry the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LocalizationId(pub u64);

impl fmt::Display for LocalizationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One side of a localization: the owning endpoint and the daemon's copy of
/// that endpoint's local descriptor. The descriptor leaves the slot when it
/// is transferred to the client or closed during record removal.
#[derive(Debug)]
pub struct LocalSlot {
    pub owner: EndpointId,
    fd: Option<OwnedFd>,
}

/// A connected stream-socket pair manufactured for two endpoints.
///
/// Slot `a` always belongs to the smaller endpoint id so lookups are stable
/// regardless of the argument order that created the pair.
#[derive(Debug)]
pub struct Localization {
    a: LocalSlot,
    b: LocalSlot,
}

impl Localization {
    /// Create a connected socket pair for `first` and `second`.
    ///
    /// The descriptors are cloexec so they never leak into daemon-spawned
    /// children; the kernel duplicates them for the client on transfer.
    pub fn create(first: EndpointId, second: EndpointId) -> Result<Self, ContextError> {
        let (fd_a, fd_b) = socketpair(
            AddressFamily::Unix,
            SockType::Stream,
            None,
            SockFlag::SOCK_CLOEXEC,
        )
        .map_err(std::io::Error::from)?;

        let (lo, hi) = if first < second { (first, second) } else { (second, first) };
        Ok(Self {
            a: LocalSlot { owner: lo, fd: Some(fd_a) },
            b: LocalSlot { owner: hi, fd: Some(fd_b) },
        })
    }

    /// The two owning endpoint ids, slot `a` first.
    pub fn owners(&self) -> (EndpointId, EndpointId) {
        (self.a.owner, self.b.owner)
    }

    /// Given one owner, the other.
    pub fn partner_of(&self, id: EndpointId) -> Option<EndpointId> {
        if self.a.owner == id {
            Some(self.b.owner)
        } else if self.b.owner == id {
            Some(self.a.owner)
        } else {
            None
        }
    }

    /// Move the descriptor belonging to `id` out of its slot.
    pub fn take_fd(&mut self, id: EndpointId) -> Result<OwnedFd, ContextError> {
        let slot = if self.a.owner == id {
            &mut self.a
        } else if self.b.owner == id {
            &mut self.b
        } else {
            return Err(ContextError::SlotMismatch);
        };
        slot.fd.take().ok_or(ContextError::DescriptorTaken)
    }

    /// Close whatever descriptors the daemon still holds.
    pub fn close_both(&mut self) {
        self.a.fd = None;
        self.b.fd = None;
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
