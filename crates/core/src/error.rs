// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Semantic failures of IPC context operations.
//!
//! The dispatcher maps every variant to wire code 303 with the variant's
//! message as the reply text, so the `#[error]` strings here are part of the
//! wire contract. In particular `Invalid Endpoint ID '<n>'` is relied on by
//! clients verbatim.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Invalid Endpoint ID '{0}'")]
    InvalidEndpoint(i32),

    #[error("Invalid Local ID '{0}'")]
    InvalidLocalId(i32),

    #[error("Invalid Remote ID '{0}'")]
    InvalidRemoteId(i32),

    #[error("Attempt to localize already localized endpoint")]
    AlreadyLocalized,

    #[error("Requested local FD for non-localized endpoint")]
    NotLocalized,

    #[error("Local descriptor already transferred")]
    DescriptorTaken,

    /// Neither slot of the attached localization references this endpoint.
    /// Unreachable while the context invariants hold.
    #[error("Localization does not reference this endpoint")]
    SlotMismatch,

    #[error("CRC match attempted with changed values")]
    CrcChanged,

    #[error("Cannot update info for paired endpoint")]
    InfoFrozen,

    #[error("Endpoint info conflicts with previously supplied values")]
    InfoChanged,

    #[error("Missing endpoint address info")]
    MissingInfo,

    #[error("Too many potential matches")]
    TooManyMatches,

    #[error("Potential dup detected")]
    DupDetected,

    /// Socketpair creation failed; surfaces the OS error to the client.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}
