// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Localization specs: LOCALIZE and GETLOCALFD, including the out-of-band
//! descriptor transfer.

use crate::prelude::*;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;

#[test]
fn localize_two_endpoints() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    client.check("REGISTER 1 10", "200 ID 0");
    client.check("REGISTER 1 5", "200 ID 1");
    client.check("LOCALIZE 0 1", "200 OK");
}

#[test]
fn redundant_localize_is_accepted() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    client.check("REGISTER 1 10", "200 ID 0");
    client.check("REGISTER 1 5", "200 ID 1");
    client.check("LOCALIZE 0 1", "200 OK");
    client.check("LOCALIZE 0 1", "200 OK");
    client.check("LOCALIZE 0 1", "200 OK");
    client.check("LOCALIZE 1 0", "200 OK");
}

#[test]
fn localize_unknown_ids() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    client.check("REGISTER 1 10", "200 ID 0");
    client.check("LOCALIZE 5 0", "303 Invalid Local ID '5'");
    client.check("LOCALIZE 0 5", "303 Invalid Remote ID '5'");
}

#[test]
fn localized_descriptors_carry_data_end_to_end() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    client.check("REGISTER 1 10", "200 ID 0");
    client.check("REGISTER 1 5", "200 ID 1");
    client.check("LOCALIZE 0 1", "200 OK");

    // Each side fetches its descriptor on its own connection.
    let fd0 = daemon.connect().get_local_fd(0);
    let fd1 = daemon.connect().get_local_fd(1);

    let mut left = UnixStream::from(fd0);
    let mut right = UnixStream::from(fd1);

    left.write_all(b"Testing\n").unwrap();
    let mut buf = [0u8; 8];
    right.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"Testing\n");

    // And the other direction.
    right.write_all(b"Reply\n").unwrap();
    let mut buf = [0u8; 6];
    left.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"Reply\n");
}

#[test]
fn getlocalfd_failure_modes() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    client.check("GETLOCALFD 0", "303 Invalid Endpoint ID '0'");

    client.check("REGISTER 1 10", "200 ID 0");
    client.check("GETLOCALFD 0", "303 Requested local FD for non-localized endpoint");

    client.check("REGISTER 1 5", "200 ID 1");
    client.check("LOCALIZE 0 1", "200 OK");

    let _fd = daemon.connect().get_local_fd(0);
    client.check("GETLOCALFD 0", "303 Local descriptor already transferred");
}

#[test]
fn cross_localization_is_rejected() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    client.check("REGISTER 1 10", "200 ID 0");
    client.check("REGISTER 1 5", "200 ID 1");
    client.check("REGISTER 1 7", "200 ID 2");
    client.check("LOCALIZE 0 1", "200 OK");
    client.check("LOCALIZE 0 2", "303 Attempt to localize already localized endpoint");
}

#[test]
fn unregister_tears_down_localization() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    client.check("REGISTER 1 10", "200 ID 0");
    client.check("REGISTER 2 5", "200 ID 1");
    client.check("LOCALIZE 0 1", "200 OK");
    client.check("UNREGISTER 0", "200 OK");

    // The daemon closed both of its descriptor copies.
    client.check("GETLOCALFD 1", "303 Local descriptor already transferred");
}
