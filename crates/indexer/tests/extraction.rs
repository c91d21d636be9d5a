// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

//! End-to-end address extraction over realistic decoded-block JSON.

use dotidx::extractor::extract_addresses;
use dotidx::filter::{EventMatcher, filter_extrinsics};
use serde_json::json;

const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
const BOB: &str = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty";

#[test]
fn extracts_addresses_and_rejects_hex() {
    let extrinsics = json!([
        { "id": ALICE },
        { "data": [BOB, "0x0abc"] }
    ]);
    let addresses = extract_addresses(&extrinsics);
    assert_eq!(addresses, vec![BOB.to_string(), ALICE.to_string()]);
}

#[test]
fn extraction_and_filter_agree_on_a_transfer_block() {
    let extrinsics = json!([
        {
            "method": { "pallet": "timestamp", "method": "set" },
            "signature": null,
            "args": { "now": "1600000000000" },
            "events": []
        },
        {
            "method": { "pallet": "balances", "method": "transferKeepAlive" },
            "signature": { "signer": { "id": ALICE }, "signature": "0x00" },
            "args": { "dest": { "id": BOB }, "value": "12345" },
            "events": [
                { "method": { "pallet": "balances", "method": "Transfer" },
                  "data": [ALICE, BOB, "12345"] }
            ]
        }
    ]);

    let addresses = extract_addresses(&extrinsics);
    assert_eq!(addresses.len(), 2);
    assert!(addresses.contains(&ALICE.to_string()));
    assert!(addresses.contains(&BOB.to_string()));

    let (projection, found) = filter_extrinsics(&extrinsics, &EventMatcher::balances(BOB));
    assert!(found);
    assert!(projection.to_string().contains("Transfer"));

    let (_, found_staking) = filter_extrinsics(&extrinsics, &EventMatcher::staking(BOB));
    assert!(!found_staking);
}

#[test]
fn timestamp_survives_serialization_round_trip() {
    let extrinsics = json!([
        { "method": { "pallet": "timestamp", "method": "set" },
          "args": { "now": "1600000000000" } }
    ]);
    let blob = extrinsics.to_string();
    assert_eq!(
        dotidx::address::extract_timestamp(&blob).unwrap(),
        "2020-09-13 12:26:40.0000"
    );
}
