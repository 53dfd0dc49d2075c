// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::net::IpAddr;
use std::str::FromStr;

use ipcd_core::{EndpointId, PeerAddr, WireTime};
use thiserror::Error;

/// One parsed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// `REGISTER PID FD`
    Register { pid: i32, fd: i32 },

    /// `REREGISTER id PID FD` (pid/fd reserved for credential checks)
    Reregister { id: EndpointId, pid: i32, fd: i32 },

    /// `UNREGISTER id`
    Unregister { id: EndpointId },

    /// `REMOVEALL PID`
    RemoveAll { pid: i32 },

    /// `LOCALIZE LID RID`
    Localize { local: EndpointId, remote: EndpointId },

    /// `GETLOCALFD id`; the reply carries the descriptor out-of-band.
    GetLocalFd { id: EndpointId },

    /// `ENDPOINT_KLUDGE id`
    EndpointKludge { id: EndpointId },

    /// `THRESH_CRC_KLUDGE id send_crc recv_crc last_try`
    ThreshCrcKludge { id: EndpointId, send_crc: i64, recv_crc: i64, last_try: bool },

    /// `ENDPOINT_INFO id sip sport dip dport start_s start_ns end_s end_ns is_accept`
    EndpointInfo {
        id: EndpointId,
        src: PeerAddr,
        dst: PeerAddr,
        start: WireTime,
        end: WireTime,
        is_accept: bool,
    },

    /// `FIND_PAIR id send_crc recv_crc last_try`
    FindPair { id: EndpointId, send_crc: i64, recv_crc: i64, last_try: bool },
}

/// Parse-level failures, mapped to wire codes 300/301/302.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Unrecognized command")]
    Unrecognized,

    #[error("{0}")]
    InvalidParameter(String),

    #[error("Insufficient arguments given")]
    InsufficientArgs,
}

impl RequestError {
    pub fn code(&self) -> u16 {
        match self {
            RequestError::Unrecognized => 300,
            RequestError::InvalidParameter(_) => 301,
            RequestError::InsufficientArgs => 302,
        }
    }
}

impl Request {
    /// Parse one request line (without its terminating LF).
    ///
    /// Fields are separated by single spaces; runs of spaces produce empty
    /// fields, which fail numeric parsing, matching the original daemon.
    pub fn parse(line: &str) -> Result<Self, RequestError> {
        let tokens: Vec<&str> = line.split(' ').collect();
        if tokens.len() < 2 {
            return Err(RequestError::InsufficientArgs);
        }

        match tokens[0] {
            "REGISTER" => {
                require(&tokens, 3)?;
                Ok(Request::Register { pid: int(tokens[1])?, fd: int(tokens[2])? })
            }
            "REREGISTER" => {
                require(&tokens, 4)?;
                Ok(Request::Reregister {
                    id: endpoint_id(tokens[1])?,
                    pid: int(tokens[2])?,
                    fd: int(tokens[3])?,
                })
            }
            "UNREGISTER" => Ok(Request::Unregister { id: endpoint_id(tokens[1])? }),
            "REMOVEALL" => Ok(Request::RemoveAll { pid: int(tokens[1])? }),
            "LOCALIZE" => {
                require(&tokens, 3)?;
                Ok(Request::Localize {
                    local: endpoint_id(tokens[1])?,
                    remote: endpoint_id(tokens[2])?,
                })
            }
            "GETLOCALFD" => Ok(Request::GetLocalFd { id: endpoint_id(tokens[1])? }),
            "ENDPOINT_KLUDGE" => Ok(Request::EndpointKludge { id: endpoint_id(tokens[1])? }),
            "THRESH_CRC_KLUDGE" => {
                require(&tokens, 5)?;
                Ok(Request::ThreshCrcKludge {
                    id: endpoint_id(tokens[1])?,
                    send_crc: int(tokens[2])?,
                    recv_crc: int(tokens[3])?,
                    last_try: flag(tokens[4])?,
                })
            }
            "ENDPOINT_INFO" => {
                require(&tokens, 11)?;
                Ok(Request::EndpointInfo {
                    id: endpoint_id(tokens[1])?,
                    src: PeerAddr::new(ip(tokens[2])?, int(tokens[3])?),
                    dst: PeerAddr::new(ip(tokens[4])?, int(tokens[5])?),
                    start: WireTime::new(int(tokens[6])?, int(tokens[7])?),
                    end: WireTime::new(int(tokens[8])?, int(tokens[9])?),
                    is_accept: flag(tokens[10])?,
                })
            }
            "FIND_PAIR" => {
                require(&tokens, 5)?;
                Ok(Request::FindPair {
                    id: endpoint_id(tokens[1])?,
                    send_crc: int(tokens[2])?,
                    recv_crc: int(tokens[3])?,
                    last_try: flag(tokens[4])?,
                })
            }
            _ => Err(RequestError::Unrecognized),
        }
    }
}

fn require(tokens: &[&str], n: usize) -> Result<(), RequestError> {
    if tokens.len() < n {
        return Err(RequestError::InsufficientArgs);
    }
    Ok(())
}

fn int<T: FromStr>(token: &str) -> Result<T, RequestError> {
    token
        .parse()
        .map_err(|_| RequestError::InvalidParameter(format!("Invalid integer '{token}'")))
}

fn endpoint_id(token: &str) -> Result<EndpointId, RequestError> {
    int(token).map(EndpointId)
}

fn ip(token: &str) -> Result<IpAddr, RequestError> {
    token
        .parse()
        .map_err(|_| RequestError::InvalidParameter(format!("Invalid address '{token}'")))
}

/// Integer-valued boolean: anything non-zero is true.
fn flag(token: &str) -> Result<bool, RequestError> {
    int::<i64>(token).map(|value| value != 0)
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
