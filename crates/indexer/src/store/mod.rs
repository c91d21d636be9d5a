// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Partitioned PostgreSQL store for blocks and address→block edges.
//!
//! All writes are idempotent upserts keyed on `(hash, created_at)` for
//! blocks and `(address, block_id)` for edges, so workers may persist in any
//! order and crash-retry safely.

mod ddl;
mod queries;

pub use ddl::{sanitize_chain_name, sanitize_relay};

use crate::extractor::extract_addresses;
use crate::metrics::{Metrics, Stats};
use crate::reader::BlockData;
use chrono::{DateTime, Duration as ChronoDuration, Months, NaiveDateTime, Utc};
use dotidx_config::DbConfig;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("Unknown named query '{0}'")]
    UnknownQuery(String),
}

pub struct Store {
    pool: PgPool,
    metrics: Metrics,
    use_tablespaces: bool,
}

impl Store {
    /// Open a bounded connection pool against the configured database.
    pub async fn connect(config: &DbConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_open)
            .min_connections(config.max_idle)
            .max_lifetime(Duration::from_secs(config.conn_max_life))
            .idle_timeout(Duration::from_secs(config.conn_max_idle))
            .connect(&config.url())
            .await?;
        Ok(Self {
            pool,
            metrics: Metrics::new("store"),
            use_tablespaces: config.use_tablespaces,
        })
    }

    /// Idempotently create the catalog, parent tables, partitions and
    /// grants for one `(relay, chain)` pair. Safe to call on every startup;
    /// observed first/last timestamps extend the partition window when they
    /// fall outside it.
    pub async fn create_tables(
        &self,
        relay: &str,
        chain: &str,
        first_ts: Option<NaiveDateTime>,
        last_ts: Option<NaiveDateTime>,
    ) -> Result<(), StoreError> {
        let statements = ddl::bootstrap_statements(
            relay,
            chain,
            first_ts.as_ref(),
            last_ts.as_ref(),
            self.use_tablespaces,
        );
        for statement in statements {
            sqlx::query(&statement).execute(&self.pool).await?;
        }
        tracing::info!(relay, chain, "Bootstrapped chain tables");
        Ok(())
    }

    /// Create the GIN index on one monthly partition. Intended for months
    /// that have become immutable; expensive on partitions still being
    /// written.
    pub async fn create_finalized_month_index(
        &self,
        relay: &str,
        chain: &str,
        year: i32,
        month: u32,
    ) -> Result<(), StoreError> {
        let statement = ddl::month_gin_index_statement(relay, chain, year, month);
        sqlx::query(&statement).execute(&self.pool).await?;
        Ok(())
    }

    /// Persist a batch of blocks and their address edges in one transaction.
    ///
    /// Records one latency sample covering the whole batch.
    pub async fn save(
        &self,
        items: &[BlockData],
        relay: &str,
        chain: &str,
    ) -> Result<(), StoreError> {
        if items.is_empty() {
            return Ok(());
        }
        let start = Instant::now();
        let result = self.save_inner(items, relay, chain).await;
        self.metrics.record(start, items.len() as u64, result.is_err());
        result
    }

    async fn save_inner(
        &self,
        items: &[BlockData],
        relay: &str,
        chain: &str,
    ) -> Result<(), StoreError> {
        let blocks_table = ddl::blocks_table(relay, chain);
        let address_table = ddl::address_table(relay, chain);

        let block_sql = format!(
            "INSERT INTO {blocks_table} \
             (block_id, created_at, hash, parent_hash, state_root, extrinsics_root, \
              author_id, finalized, on_initialize, on_finalize, logs, extrinsics) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (hash, created_at) DO UPDATE SET \
             block_id = EXCLUDED.block_id, \
             parent_hash = EXCLUDED.parent_hash, \
             state_root = EXCLUDED.state_root, \
             extrinsics_root = EXCLUDED.extrinsics_root, \
             author_id = EXCLUDED.author_id, \
             finalized = EXCLUDED.finalized, \
             on_initialize = EXCLUDED.on_initialize, \
             on_finalize = EXCLUDED.on_finalize, \
             logs = EXCLUDED.logs, \
             extrinsics = EXCLUDED.extrinsics"
        );
        let edge_sql = format!(
            "INSERT INTO {address_table} (address, block_id) VALUES ($1, $2) \
             ON CONFLICT DO NOTHING"
        );

        let mut tx = self.pool.begin().await?;
        for block in items {
            let created_at = resolved_timestamp(block, relay);
            sqlx::query(&block_sql)
                .bind(block.id)
                .bind(created_at)
                .bind(&block.hash)
                .bind(&block.parent_hash)
                .bind(&block.state_root)
                .bind(&block.extrinsics_root)
                .bind(&block.author_id)
                .bind(block.finalized)
                .bind(&block.on_initialize)
                .bind(&block.on_finalize)
                .bind(&block.logs)
                .bind(&block.extrinsics)
                .execute(&mut *tx)
                .await?;

            for address in extract_addresses(&block.extrinsics) {
                sqlx::query(&edge_sql)
                    .bind(&address)
                    .bind(block.id)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    /// Set of block ids already present in the closed interval
    /// `[start, end]`. Degrades to the empty set on error: the scheduler
    /// then treats the whole range as missing, which is safe because writes
    /// are idempotent.
    pub async fn get_existing_blocks(
        &self,
        relay: &str,
        chain: &str,
        start: i64,
        end: i64,
    ) -> HashSet<i64> {
        let sql = format!(
            "SELECT DISTINCT block_id FROM {} WHERE block_id BETWEEN $1 AND $2",
            ddl::blocks_table(relay, chain)
        );
        match sqlx::query(&sql)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await
        {
            Ok(rows) => rows
                .iter()
                .filter_map(|row| row.try_get::<i64, _>(0).ok())
                .collect(),
            Err(e) => {
                tracing::warn!(relay, chain, start, end, "Gap query failed: {e}");
                HashSet::new()
            }
        }
    }

    /// Execute a registered named query and return column-name-keyed rows.
    pub async fn execute_named_query(
        &self,
        name: &str,
        relay: &str,
        chain: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<JsonValue>, StoreError> {
        let sql = queries::render(name, relay, chain, year, month)
            .ok_or_else(|| StoreError::UnknownQuery(name.to_string()))?;
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    /// Execute a registered named query and overwrite its row in the
    /// monthly cache.
    pub async fn execute_and_store_named_query(
        &self,
        name: &str,
        relay: &str,
        chain: &str,
        year: i32,
        month: u32,
    ) -> Result<Vec<JsonValue>, StoreError> {
        let rows = self
            .execute_named_query(name, relay, chain, year, month)
            .await?;
        let sql = format!(
            "INSERT INTO {}.dotidx_monthly_query_results \
             (relay, chain, query_name, year, month, result, last_updated) \
             VALUES ($1, $2, $3, $4, $5, $6, now()) \
             ON CONFLICT (relay, chain, query_name, year, month) \
             DO UPDATE SET result = EXCLUDED.result, last_updated = now()",
            ddl::SCHEMA
        );
        sqlx::query(&sql)
            .bind(sanitize_relay(relay))
            .bind(sanitize_chain_name(relay, chain))
            .bind(name)
            .bind(year)
            .bind(month as i32)
            .bind(JsonValue::Array(rows.clone()))
            .execute(&self.pool)
            .await?;
        Ok(rows)
    }

    /// When the cached result of a named query was last recomputed; the
    /// epoch when it never was.
    pub async fn read_time_named_query(
        &self,
        name: &str,
        relay: &str,
        chain: &str,
        year: i32,
        month: u32,
    ) -> Result<DateTime<Utc>, StoreError> {
        let sql = format!(
            "SELECT last_updated FROM {}.dotidx_monthly_query_results \
             WHERE relay = $1 AND chain = $2 AND query_name = $3 AND year = $4 AND month = $5",
            ddl::SCHEMA
        );
        let row = sqlx::query(&sql)
            .bind(sanitize_relay(relay))
            .bind(sanitize_chain_name(relay, chain))
            .bind(name)
            .bind(year)
            .bind(month as i32)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row
            .and_then(|row| row.try_get::<DateTime<Utc>, _>(0).ok())
            .unwrap_or(DateTime::UNIX_EPOCH))
    }

    pub fn get_stats(&self) -> Stats {
        self.metrics.stats()
    }

    /// Close the pool; part of the graceful shutdown sequence.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// The timestamp a block is stored under: the one extracted from the
/// Timestamp pallet, or a deterministic synthetic fallback. Never null.
pub fn resolved_timestamp(block: &BlockData, relay: &str) -> NaiveDateTime {
    block
        .timestamp()
        .and_then(|ts| NaiveDateTime::parse_from_str(&ts, "%Y-%m-%d %H:%M:%S%.f").ok())
        .unwrap_or_else(|| synthetic_timestamp(relay, block.id))
}

/// Deterministic fallback timestamp for blocks without a Timestamp.set
/// inherent: the relay's partition epoch plus one second per block id,
/// clamped inside the baked partition window so it always routes to an
/// existing partition.
pub fn synthetic_timestamp(relay: &str, block_id: i64) -> NaiveDateTime {
    let epoch = ddl::first_month(relay)
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time");
    let window_end = (ddl::first_month(relay) + Months::new(ddl::PARTITION_WINDOW_MONTHS as u32))
        .and_hms_opt(0, 0, 0)
        .expect("midnight is a valid time")
        - ChronoDuration::seconds(1);
    let max_seconds = (window_end - epoch).num_seconds();
    epoch + ChronoDuration::seconds(block_id.clamp(0, max_seconds))
}

fn row_to_json(row: &PgRow) -> JsonValue {
    let mut map = serde_json::Map::new();
    for (index, column) in row.columns().iter().enumerate() {
        let value = if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
            v.map_or(JsonValue::Null, |n| JsonValue::Number(n.into()))
        } else if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
            v.and_then(serde_json::Number::from_f64)
                .map_or(JsonValue::Null, JsonValue::Number)
        } else if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
            v.map_or(JsonValue::Null, JsonValue::Bool)
        } else if let Ok(v) = row.try_get::<Option<String>, _>(index) {
            v.map_or(JsonValue::Null, JsonValue::String)
        } else if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(index) {
            v.map_or(JsonValue::Null, |ts| JsonValue::String(ts.to_rfc3339()))
        } else if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(index) {
            v.map_or(JsonValue::Null, |ts| JsonValue::String(ts.to_string()))
        } else if let Ok(v) = row.try_get::<Option<JsonValue>, _>(index) {
            v.unwrap_or(JsonValue::Null)
        } else {
            JsonValue::Null
        };
        map.insert(column.name().to_string(), value);
    }
    JsonValue::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn block(id: i64, extrinsics: JsonValue) -> BlockData {
        serde_json::from_value(json!({
            "number": id,
            "hash": format!("0x{id:064x}"),
            "parentHash": "0xbb",
            "stateRoot": "0xcc",
            "extrinsicsRoot": "0xdd",
            "extrinsics": extrinsics
        }))
        .unwrap()
    }

    #[test]
    fn test_resolved_timestamp_prefers_extracted() {
        let b = block(
            9,
            json!([{ "method": { "pallet": "timestamp", "method": "set" },
                     "args": { "now": "1600000000000" } }]),
        );
        let ts = resolved_timestamp(&b, "polkadot");
        assert_eq!(ts.to_string(), "2020-09-13 12:26:40");
    }

    #[test]
    fn test_resolved_timestamp_synthetic_fallback() {
        let b = block(120, json!([]));
        let ts = resolved_timestamp(&b, "polkadot");
        assert_eq!(ts, synthetic_timestamp("polkadot", 120));
        assert_eq!(ts.to_string(), "2020-04-01 00:02:00");
    }

    #[test]
    fn test_synthetic_timestamp_deterministic_and_in_window() {
        assert_eq!(
            synthetic_timestamp("kusama", 77),
            synthetic_timestamp("kusama", 77)
        );
        // A huge id clamps to the end of the window instead of escaping it.
        let far = synthetic_timestamp("polkadot", i64::MAX);
        assert_eq!(far.to_string(), "2026-03-31 23:59:59");
    }
}
