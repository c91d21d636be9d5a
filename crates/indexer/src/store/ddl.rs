// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Table naming, partition layout and DDL rendering.
//!
//! Blocks are range-partitioned by `created_at` into monthly partitions over
//! a six-year window starting at the relay's first expected month. Address
//! edges are hash-partitioned by address. Partition placement round-robins
//! over the `dotidx_fast`/`dotidx_slow` tablespace pools, recent months on
//! fast storage.

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};

pub const SCHEMA: &str = "chain";

/// Schema version stamped into `chain.dotidx_version`.
pub const SCHEMA_VERSION: i32 = 3;

/// Number of monthly partitions in the baked-in window (six years).
pub const PARTITION_WINDOW_MONTHS: usize = 72;

/// Months at the tail of the window placed on fast tablespaces.
const FAST_RECENT_MONTHS: usize = 24;

/// Hash buckets for the address→block edge table.
pub const ADDRESS_BUCKETS: usize = 4;

const FAST_TABLESPACES: [&str; 4] = [
    "dotidx_fast0",
    "dotidx_fast1",
    "dotidx_fast2",
    "dotidx_fast3",
];

const SLOW_TABLESPACES: [&str; 6] = [
    "dotidx_slow0",
    "dotidx_slow1",
    "dotidx_slow2",
    "dotidx_slow3",
    "dotidx_slow4",
    "dotidx_slow5",
];

/// First partition month per relay. Baked in rather than configured so every
/// deployment produces the same partition layout.
pub fn first_month(relay: &str) -> NaiveDate {
    let (year, month) = match relay {
        "polkadot" => (2020, 4),
        "kusama" => (2019, 9),
        _ => (2020, 1),
    };
    NaiveDate::from_ymd_opt(year, month, 1).expect("baked-in partition epoch is valid")
}

fn strip_non_alphanumeric(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

/// Sanitize a relay name for use as a table suffix.
pub fn sanitize_relay(relay: &str) -> String {
    strip_non_alphanumeric(relay)
}

/// Sanitize a chain name for use as a table suffix: lowercase, strip
/// non-alphanumerics, and drop the redundant relay substring when the chain
/// is not the relay itself.
pub fn sanitize_chain_name(relay: &str, chain: &str) -> String {
    let relay_part = strip_non_alphanumeric(relay);
    let chain_part = strip_non_alphanumeric(chain);
    if chain_part == relay_part || relay_part.is_empty() {
        return chain_part;
    }
    let stripped = chain_part.replace(&relay_part, "");
    if stripped.is_empty() { chain_part } else { stripped }
}

pub fn blocks_table(relay: &str, chain: &str) -> String {
    format!(
        "{SCHEMA}.blocks_{}_{}",
        strip_non_alphanumeric(relay),
        sanitize_chain_name(relay, chain)
    )
}

pub fn address_table(relay: &str, chain: &str) -> String {
    format!(
        "{SCHEMA}.address2blocks_{}_{}",
        strip_non_alphanumeric(relay),
        sanitize_chain_name(relay, chain)
    )
}

fn month_of(ts: &NaiveDateTime) -> NaiveDate {
    NaiveDate::from_ymd_opt(ts.year(), ts.month(), 1).expect("first of month is valid")
}

/// The ordered list of partition months: the baked six-year window for the
/// relay, extended to cover any observed timestamps outside it.
pub fn partition_months(
    relay: &str,
    first_ts: Option<&NaiveDateTime>,
    last_ts: Option<&NaiveDateTime>,
) -> Vec<NaiveDate> {
    let mut start = first_month(relay);
    let mut end = start + Months::new(PARTITION_WINDOW_MONTHS as u32);

    if let Some(first) = first_ts {
        let observed = month_of(first);
        if observed < start {
            start = observed;
        }
    }
    if let Some(last) = last_ts {
        let observed = month_of(last) + Months::new(1);
        if observed > end {
            end = observed;
        }
    }

    let mut months = Vec::new();
    let mut current = start;
    while current < end {
        months.push(current);
        current = current + Months::new(1);
    }
    months
}

/// Tablespace for the partition at `index` out of `total`: the most recent
/// months round-robin over the fast pool, older months over the slow pool.
pub fn tablespace_for(index: usize, total: usize) -> &'static str {
    if index + FAST_RECENT_MONTHS >= total {
        FAST_TABLESPACES[index % FAST_TABLESPACES.len()]
    } else {
        SLOW_TABLESPACES[index % SLOW_TABLESPACES.len()]
    }
}

fn tablespace_clause(tablespace: &str, use_tablespaces: bool) -> String {
    if use_tablespaces {
        format!(" TABLESPACE {tablespace}")
    } else {
        String::new()
    }
}

pub fn partition_suffix(month: NaiveDate) -> String {
    format!("y{}m{:02}", month.year(), month.month())
}

/// Render the full idempotent bootstrap DDL for one `(relay, chain)` pair.
pub fn bootstrap_statements(
    relay: &str,
    chain: &str,
    first_ts: Option<&NaiveDateTime>,
    last_ts: Option<&NaiveDateTime>,
    use_tablespaces: bool,
) -> Vec<String> {
    let blocks = blocks_table(relay, chain);
    let addresses = address_table(relay, chain);
    let mut statements = vec![
        format!("CREATE SCHEMA IF NOT EXISTS {SCHEMA}"),
        format!(
            "CREATE TABLE IF NOT EXISTS {SCHEMA}.dotidx (\
             relay TEXT NOT NULL, \
             chain TEXT NOT NULL, \
             created_at TIMESTAMPTZ NOT NULL DEFAULT now(), \
             PRIMARY KEY (relay, chain))"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {SCHEMA}.dotidx_version (\
             version INTEGER PRIMARY KEY, \
             applied_at TIMESTAMPTZ NOT NULL DEFAULT now())"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {SCHEMA}.dotidx_monthly_query_results (\
             relay TEXT NOT NULL, \
             chain TEXT NOT NULL, \
             query_name TEXT NOT NULL, \
             year INTEGER NOT NULL, \
             month INTEGER NOT NULL, \
             result JSONB NOT NULL, \
             last_updated TIMESTAMPTZ NOT NULL DEFAULT now(), \
             PRIMARY KEY (relay, chain, query_name, year, month))"
        ),
        format!(
            "INSERT INTO {SCHEMA}.dotidx (relay, chain) VALUES ('{}', '{}') \
             ON CONFLICT DO NOTHING",
            strip_non_alphanumeric(relay),
            sanitize_chain_name(relay, chain)
        ),
        format!(
            "INSERT INTO {SCHEMA}.dotidx_version (version) VALUES ({SCHEMA_VERSION}) \
             ON CONFLICT DO NOTHING"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {blocks} (\
             block_id BIGINT NOT NULL, \
             created_at TIMESTAMP NOT NULL, \
             hash TEXT NOT NULL, \
             parent_hash TEXT, \
             state_root TEXT, \
             extrinsics_root TEXT, \
             author_id TEXT, \
             finalized BOOLEAN NOT NULL DEFAULT FALSE, \
             on_initialize JSONB, \
             on_finalize JSONB, \
             logs JSONB, \
             extrinsics JSONB, \
             PRIMARY KEY (hash, created_at)) \
             PARTITION BY RANGE (created_at)"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS {addresses} (\
             address TEXT NOT NULL, \
             block_id BIGINT NOT NULL, \
             PRIMARY KEY (address, block_id)) \
             PARTITION BY HASH (address)"
        ),
    ];

    let months = partition_months(relay, first_ts, last_ts);
    let total = months.len();
    for (index, month) in months.iter().enumerate() {
        let from = *month;
        let to = from + Months::new(1);
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {blocks}_{} PARTITION OF {blocks} \
             FOR VALUES FROM ('{}') TO ('{}'){}",
            partition_suffix(from),
            from.format("%Y-%m-%d"),
            to.format("%Y-%m-%d"),
            tablespace_clause(tablespace_for(index, total), use_tablespaces),
        ));
    }

    for bucket in 0..ADDRESS_BUCKETS {
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {addresses}_p{bucket} PARTITION OF {addresses} \
             FOR VALUES WITH (MODULUS {ADDRESS_BUCKETS}, REMAINDER {bucket}){}",
            tablespace_clause(
                FAST_TABLESPACES[bucket % FAST_TABLESPACES.len()],
                use_tablespaces
            ),
        ));
    }

    let index_name = blocks
        .strip_prefix(&format!("{SCHEMA}."))
        .unwrap_or(&blocks)
        .to_string();
    statements.push(format!(
        "CREATE INDEX IF NOT EXISTS {index_name}_block_id_idx ON {blocks} (block_id)"
    ));

    statements.push(format!("GRANT USAGE ON SCHEMA {SCHEMA} TO PUBLIC"));
    statements.push(format!(
        "GRANT SELECT ON ALL TABLES IN SCHEMA {SCHEMA} TO PUBLIC"
    ));

    statements
}

/// DDL for the optional GIN index on one immutable monthly partition.
pub fn month_gin_index_statement(relay: &str, chain: &str, year: i32, month: u32) -> String {
    let blocks = blocks_table(relay, chain);
    let index_name = format!(
        "{}_y{year}m{month:02}_extrinsics_idx",
        blocks.strip_prefix(&format!("{SCHEMA}.")).unwrap_or(&blocks)
    );
    format!(
        "CREATE INDEX IF NOT EXISTS {index_name} ON {blocks}_y{year}m{month:02} \
         USING gin (extrinsics jsonb_path_ops)"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_chain_name() {
        assert_eq!(sanitize_chain_name("polkadot", "polkadot"), "polkadot");
        assert_eq!(sanitize_chain_name("polkadot", "AssetHub-Polkadot"), "assethub");
        assert_eq!(sanitize_chain_name("kusama", "Encointer"), "encointer");
        assert_eq!(sanitize_chain_name("polkadot", "Acala!"), "acala");
    }

    #[test]
    fn test_table_names() {
        assert_eq!(
            blocks_table("polkadot", "AssetHub-Polkadot"),
            "chain.blocks_polkadot_assethub"
        );
        assert_eq!(
            address_table("kusama", "kusama"),
            "chain.address2blocks_kusama_kusama"
        );
    }

    #[test]
    fn test_partition_window_polkadot() {
        let months = partition_months("polkadot", None, None);
        assert_eq!(months.len(), PARTITION_WINDOW_MONTHS);
        assert_eq!(months[0], NaiveDate::from_ymd_opt(2020, 4, 1).unwrap());
        assert_eq!(
            months[months.len() - 1],
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
        );
    }

    #[test]
    fn test_partition_window_kusama_epoch() {
        let months = partition_months("kusama", None, None);
        assert_eq!(months[0], NaiveDate::from_ymd_opt(2019, 9, 1).unwrap());
    }

    #[test]
    fn test_partition_window_extends_for_observed_timestamps() {
        let late = NaiveDate::from_ymd_opt(2027, 2, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        let months = partition_months("polkadot", None, Some(&late));
        assert_eq!(
            months[months.len() - 1],
            NaiveDate::from_ymd_opt(2027, 2, 1).unwrap()
        );
    }

    #[test]
    fn test_tablespace_routing() {
        let total = PARTITION_WINDOW_MONTHS;
        // Oldest months go to the slow pool, round-robin.
        assert_eq!(tablespace_for(0, total), "dotidx_slow0");
        assert_eq!(tablespace_for(1, total), "dotidx_slow1");
        assert_eq!(tablespace_for(7, total), "dotidx_slow1");
        // The last two years go to the fast pool.
        assert_eq!(tablespace_for(total - 1, total), "dotidx_fast3");
        assert_eq!(tablespace_for(total - 24, total), "dotidx_fast0");
        assert_eq!(tablespace_for(total - 25, total), "dotidx_slow5");
    }

    #[test]
    fn test_bootstrap_statements_shape() {
        let statements = bootstrap_statements("polkadot", "polkadot", None, None, true);
        let blocks_parent = statements
            .iter()
            .find(|s| s.contains("CREATE TABLE IF NOT EXISTS chain.blocks_polkadot_polkadot ("))
            .expect("blocks parent table statement");
        assert!(blocks_parent.contains("PARTITION BY RANGE (created_at)"));

        let month_partitions: Vec<_> = statements
            .iter()
            .filter(|s| s.contains("PARTITION OF chain.blocks_polkadot_polkadot"))
            .collect();
        assert_eq!(month_partitions.len(), PARTITION_WINDOW_MONTHS);
        assert!(month_partitions[0].contains("FROM ('2020-04-01') TO ('2020-05-01')"));
        assert!(month_partitions[0].contains("TABLESPACE dotidx_slow"));
        assert!(month_partitions[PARTITION_WINDOW_MONTHS - 1].contains("TABLESPACE dotidx_fast"));

        let bucket_partitions: Vec<_> = statements
            .iter()
            .filter(|s| s.contains("PARTITION OF chain.address2blocks_polkadot_polkadot"))
            .collect();
        assert_eq!(bucket_partitions.len(), ADDRESS_BUCKETS);
        assert!(bucket_partitions[0].contains("MODULUS 4, REMAINDER 0"));
    }

    #[test]
    fn test_bootstrap_without_tablespaces() {
        let statements = bootstrap_statements("polkadot", "polkadot", None, None, false);
        assert!(statements.iter().all(|s| !s.contains("TABLESPACE")));
    }

    #[test]
    fn test_month_gin_index_statement() {
        let sql = month_gin_index_statement("polkadot", "polkadot", 2023, 7);
        assert!(sql.contains("chain.blocks_polkadot_polkadot_y2023m07"));
        assert!(sql.contains("jsonb_path_ops"));
    }
}
