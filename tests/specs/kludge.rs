// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pairing specs for the metadata-free strategies: ENDPOINT_KLUDGE and
//! THRESH_CRC_KLUDGE.

use crate::prelude::*;
use std::time::Duration;

#[test]
fn endpoint_kludge_rendezvous() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    client.check("REGISTER 1 10", "200 ID 0");
    client.check("REGISTER 1 15", "200 ID 1");
    client.check("REGISTER 1 20", "200 ID 2");
    client.check("REGISTER 2 10", "200 ID 3");
    client.check("REGISTER 2 15", "200 ID 4");

    client.check("ENDPOINT_KLUDGE 0", "200 NOPAIR");
    client.check("ENDPOINT_KLUDGE 0", "200 NOPAIR");
    client.check("ENDPOINT_KLUDGE 0", "200 NOPAIR");
    client.check("ENDPOINT_KLUDGE 1", "200 PAIR 0");
    client.check("ENDPOINT_KLUDGE 1", "200 PAIR 0");
    client.check("ENDPOINT_KLUDGE 0", "200 PAIR 1");

    // The established pair can be localized.
    client.check("LOCALIZE 0 1", "200 OK");
}

#[test]
fn stale_waiter_expires() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    client.check("REGISTER 1 10", "200 ID 0");
    client.check("REGISTER 2 20", "200 ID 1");

    client.check("ENDPOINT_KLUDGE 0", "200 NOPAIR");

    // Well past the 100ms waiter window: the parked endpoint is forgotten
    // and the newcomer parks instead.
    std::thread::sleep(Duration::from_millis(150));
    client.check("ENDPOINT_KLUDGE 1", "200 NOPAIR");
    client.check("ENDPOINT_KLUDGE 0", "200 PAIR 1");
}

#[test]
fn kludge_unknown_id() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    client.check("ENDPOINT_KLUDGE 9", "303 Invalid Endpoint ID '9'");
}

#[test]
fn crc_kludge_pairs_on_crossed_fingerprints() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    client.check("REGISTER 1 10", "200 ID 0");
    client.check("REGISTER 2 20", "200 ID 1");
    client.check("REGISTER 3 30", "200 ID 2");

    client.check("THRESH_CRC_KLUDGE 0 1234 4455 0", "200 NOPAIR");
    client.check("THRESH_CRC_KLUDGE 0 1234 4455 0", "200 NOPAIR");
    client.check("THRESH_CRC_KLUDGE 0 1234 4455 0", "200 NOPAIR");
    client.check("THRESH_CRC_KLUDGE 1 4455 1234 0", "200 PAIR 0");
    client.check("THRESH_CRC_KLUDGE 0 1234 4455 0", "200 PAIR 1");

    // The pair is taken; the same fingerprint on a third endpoint waits.
    client.check("THRESH_CRC_KLUDGE 2 1234 4455 0", "200 NOPAIR");
}

#[test]
fn crc_kludge_give_up_cannot_match_later() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    client.check("REGISTER 1 10", "200 ID 0");
    client.check("REGISTER 2 20", "200 ID 1");

    client.check("THRESH_CRC_KLUDGE 0 1234 4455 1", "200 NOPAIR");
    client.check("THRESH_CRC_KLUDGE 1 4455 1234 0", "200 NOPAIR");
}

#[test]
fn crc_kludge_rejects_changed_fingerprint() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    client.check("REGISTER 1 10", "200 ID 0");
    client.check("THRESH_CRC_KLUDGE 0 1234 4455 0", "200 NOPAIR");
    client.check("THRESH_CRC_KLUDGE 0 1 2 0", "303 CRC match attempted with changed values");
}

#[test]
fn zero_crc_matches_unset_fingerprint() {
    // Zero is both a legal CRC and the unset sentinel: a 0/0 probe pairs
    // with a record that never supplied a fingerprint. Documented defect,
    // preserved for compatibility.
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    client.check("REGISTER 1 10", "200 ID 0");
    client.check("REGISTER 2 20", "200 ID 1");
    client.check("THRESH_CRC_KLUDGE 0 0 0 0", "200 PAIR 1");
}
