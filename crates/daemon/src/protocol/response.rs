// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use ipcd_core::{ContextError, EndpointId};

use super::RequestError;

/// One reply line. `Display` renders the exact wire form, without the
/// terminating LF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `200 OK`
    Ok,

    /// `200 ID <n>`: fresh registration.
    Id(EndpointId),

    /// `200 REMOVED <n>`: removeall count.
    Removed(usize),

    /// `200 PAIR <id>`: an established match.
    Pair(EndpointId),

    /// `200 NOPAIR`: no partner yet.
    NoPair,

    /// `<code> <message>`: any failure.
    Error { code: u16, message: String },
}

impl Response {
    /// Encode a pairing result: the core returns the request's own id to
    /// mean "no pair yet".
    pub fn pair_reply(request: EndpointId, returned: EndpointId) -> Self {
        if returned == request {
            Response::NoPair
        } else {
            Response::Pair(returned)
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Response::Error { .. })
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ok => write!(f, "200 OK"),
            Response::Id(id) => write!(f, "200 ID {id}"),
            Response::Removed(count) => write!(f, "200 REMOVED {count}"),
            Response::Pair(id) => write!(f, "200 PAIR {id}"),
            Response::NoPair => write!(f, "200 NOPAIR"),
            Response::Error { code, message } => write!(f, "{code} {message}"),
        }
    }
}

impl From<RequestError> for Response {
    fn from(err: RequestError) -> Self {
        Response::Error { code: err.code(), message: err.to_string() }
    }
}

/// Every semantic failure of the core maps to code 303.
impl From<ContextError> for Response {
    fn from(err: ContextError) -> Self {
        Response::Error { code: 303, message: err.to_string() }
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
