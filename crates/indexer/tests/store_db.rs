// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Store tests against a live PostgreSQL instance.
//!
//! Ignored by default; run with a scratch database:
//!
//! ```text
//! DOTIDX_TEST_DB_HOST=127.0.0.1 DOTIDX_TEST_DB_USER=postgres \
//! DOTIDX_TEST_DB_PASSWORD=postgres DOTIDX_TEST_DB_NAME=dotidx_test \
//! cargo test -p dotidx --test store_db -- --ignored
//! ```
//!
//! The test database must not have the dotidx tablespaces, so
//! `use_tablespaces` is off here.

use dotidx::reader::BlockData;
use dotidx::store::Store;
use dotidx_config::DbConfig;
use serde_json::json;

const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";

fn test_db_config() -> DbConfig {
    let env = |key: &str, default: &str| std::env::var(key).unwrap_or_else(|_| default.to_string());
    DbConfig {
        ip: env("DOTIDX_TEST_DB_HOST", "127.0.0.1"),
        user: env("DOTIDX_TEST_DB_USER", "postgres"),
        password: env("DOTIDX_TEST_DB_PASSWORD", "postgres"),
        name: env("DOTIDX_TEST_DB_NAME", "dotidx_test"),
        use_tablespaces: false,
        ..Default::default()
    }
}

fn sample_block(id: i64) -> BlockData {
    serde_json::from_value(json!({
        "number": id,
        "hash": format!("0x{id:064x}"),
        "parentHash": format!("0x{:064x}", id - 1),
        "stateRoot": "0xcc",
        "extrinsicsRoot": "0xdd",
        "finalized": true,
        "extrinsics": [
            { "method": { "pallet": "timestamp", "method": "set" },
              "args": { "now": "1600000000000" } },
            { "method": { "pallet": "balances", "method": "transfer" },
              "args": { "dest": { "id": ALICE } } }
        ]
    }))
    .unwrap()
}

#[tokio::test]
#[ignore]
async fn save_is_idempotent_and_gap_query_sees_rows() {
    let store = Store::connect(&test_db_config()).await.unwrap();
    store
        .create_tables("polkadot", "testchain", None, None)
        .await
        .unwrap();

    let blocks: Vec<BlockData> = (1..=5).map(sample_block).collect();
    store.save(&blocks, "polkadot", "testchain").await.unwrap();
    // Saving the same batch twice must leave identical state.
    store.save(&blocks, "polkadot", "testchain").await.unwrap();

    let existing = store
        .get_existing_blocks("polkadot", "testchain", 1, 5)
        .await;
    assert_eq!(existing, (1..=5).collect::<std::collections::HashSet<i64>>());

    let partial = store
        .get_existing_blocks("polkadot", "testchain", 4, 100)
        .await;
    assert_eq!(partial, (4..=5).collect::<std::collections::HashSet<i64>>());
}

#[tokio::test]
#[ignore]
async fn named_query_renders_and_caches() {
    let store = Store::connect(&test_db_config()).await.unwrap();
    store
        .create_tables("polkadot", "testchain", None, None)
        .await
        .unwrap();
    store
        .save(&[sample_block(42)], "polkadot", "testchain")
        .await
        .unwrap();

    let rows = store
        .execute_and_store_named_query("stats_per_month", "polkadot", "testchain", 2020, 9)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0]["blocks"].as_i64().unwrap() >= 1);

    let updated = store
        .read_time_named_query("stats_per_month", "polkadot", "testchain", 2020, 9)
        .await
        .unwrap();
    assert!(updated > chrono::DateTime::UNIX_EPOCH);

    let never = store
        .read_time_named_query("addresses_per_month", "polkadot", "testchain", 1999, 1)
        .await
        .unwrap();
    assert_eq!(never, chrono::DateTime::UNIX_EPOCH);
}
