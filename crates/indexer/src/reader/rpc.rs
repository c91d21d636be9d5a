// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

//! WebSocket JSON-RPC reader.
//!
//! Talks to the node directly over `chain_getBlockHash` / `chain_getBlock` /
//! `state_getRuntimeVersion` / `state_getMetadata` / `state_getStorage` and
//! decodes extrinsics and events itself, against runtime metadata memoized
//! per spec version.

use super::decode::{
    self, DecodedMetadata, decode_digest_logs, decode_events, decode_extrinsics, merge_events,
    strip_raw_fields,
};
use super::{BlockData, PING_TIMEOUT, ReaderError};
use crate::metrics::{Metrics, Stats};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use subxt_rpcs::client::reconnecting_rpc_client::{
    ExponentialBackoff, RpcClient as ReconnectingRpcClient,
};
use subxt_rpcs::{RpcClient, rpc_params};
use tokio::sync::{OnceCell, RwLock};

const RECONNECT_INITIAL_DELAY: Duration = Duration::from_millis(100);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RpcReader {
    rpc: RpcClient,
    url: String,
    /// Decoded runtime metadata per spec version. Written once per version,
    /// read by every worker; never evicted during a run.
    metadata: RwLock<HashMap<u32, Arc<DecodedMetadata>>>,
    init: OnceCell<()>,
    metrics: Metrics,
}

impl RpcReader {
    /// Connect to the node with reconnection support.
    pub async fn connect(url: impl Into<String>) -> Result<Self, ReaderError> {
        let url = url.into();
        let reconnecting_client = connect_with_progress_logging(&url).await?;

        Ok(Self {
            rpc: RpcClient::new(reconnecting_client),
            metrics: Metrics::new(format!("rpc {url}")),
            url,
            metadata: RwLock::new(HashMap::new()),
            init: OnceCell::new(),
        })
    }

    /// First-use initialization: resolve the hash of block 1 and prime the
    /// metadata cache from it, so the common backfill path starts with the
    /// oldest spec version already decoded.
    async fn ensure_init(&self) -> Result<(), ReaderError> {
        self.init
            .get_or_try_init(|| async {
                let hash: Option<String> = self
                    .rpc
                    .request("chain_getBlockHash", rpc_params![1u64])
                    .await?;
                if let Some(hash) = hash {
                    let _ = self.metadata_at(&hash).await?;
                }
                tracing::debug!("Initialized RPC reader for {}", self.url);
                Ok::<_, ReaderError>(())
            })
            .await
            .copied()
    }

    /// Decoded metadata for the runtime active at `hash`, memoized by spec
    /// version.
    async fn metadata_at(&self, hash: &str) -> Result<Arc<DecodedMetadata>, ReaderError> {
        let runtime_version: JsonValue = self
            .rpc
            .request("state_getRuntimeVersion", rpc_params![hash])
            .await?;
        let spec_version = runtime_version
            .get("specVersion")
            .and_then(JsonValue::as_u64)
            .ok_or_else(|| {
                ReaderError::UnexpectedResponse("specVersion missing from runtime version".into())
            })? as u32;

        if let Some(meta) = self.metadata.read().await.get(&spec_version) {
            return Ok(Arc::clone(meta));
        }

        tracing::info!(spec_version, "Fetching runtime metadata");
        let raw: String = self
            .rpc
            .request("state_getMetadata", rpc_params![hash])
            .await?;
        let bytes = hex::decode(raw.trim_start_matches("0x")).map_err(|e| {
            ReaderError::UnexpectedResponse(format!("metadata is not valid hex: {e}"))
        })?;
        let decoded = DecodedMetadata::from_bytes(&bytes)
            .map_err(|reason| ReaderError::MetadataDecode { spec_version, reason })?;

        let mut cache = self.metadata.write().await;
        Ok(Arc::clone(
            cache
                .entry(spec_version)
                .or_insert_with(|| Arc::new(decoded)),
        ))
    }

    pub async fn head_id(&self) -> Result<i64, ReaderError> {
        let start = Instant::now();
        let result = self.head_id_inner().await;
        self.metrics.record(start, 1, result.is_err());
        result
    }

    async fn head_id_inner(&self) -> Result<i64, ReaderError> {
        let header: JsonValue = self.rpc.request("chain_getHeader", rpc_params![]).await?;
        parse_block_number(&header)
    }

    pub async fn fetch_block(&self, id: i64) -> Result<BlockData, ReaderError> {
        let start = Instant::now();
        let result = self.fetch_block_inner(id).await;
        self.metrics.record(start, 1, result.is_err());
        result
    }

    async fn fetch_block_inner(&self, id: i64) -> Result<BlockData, ReaderError> {
        self.ensure_init().await?;

        let hash: Option<String> = self
            .rpc
            .request("chain_getBlockHash", rpc_params![id as u64])
            .await?;
        let hash = hash.ok_or(ReaderError::BlockNotFound(id))?;

        let meta = self.metadata_at(&hash).await?;

        let block: JsonValue = self.rpc.request("chain_getBlock", rpc_params![&hash]).await?;
        let header = block
            .pointer("/block/header")
            .ok_or_else(|| ReaderError::UnexpectedResponse("block header missing".into()))?;

        let extrinsic_hexes: Vec<String> = block
            .pointer("/block/extrinsics")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| ReaderError::UnexpectedResponse(format!("extrinsics: {e}")))?
            .unwrap_or_default();

        let mut extrinsics = decode_extrinsics(&extrinsic_hexes, &meta)
            .map_err(|reason| ReaderError::BlockDecode { block: id, reason })?;

        let events_hex: Option<String> = self
            .rpc
            .request(
                "state_getStorage",
                rpc_params![decode::system_events_key(), &hash],
            )
            .await?;
        let events = match events_hex {
            Some(raw) => {
                let bytes = hex::decode(raw.trim_start_matches("0x")).map_err(|e| {
                    ReaderError::UnexpectedResponse(format!("events are not valid hex: {e}"))
                })?;
                decode_events(&bytes, &meta)
                    .map_err(|reason| ReaderError::BlockDecode { block: id, reason })?
            }
            None => Vec::new(),
        };

        let (on_initialize, on_finalize) = merge_events(&mut extrinsics, events);
        strip_raw_fields(&mut extrinsics);

        let logs_hex: Vec<String> = header
            .pointer("/digest/logs")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| ReaderError::UnexpectedResponse(format!("digest logs: {e}")))?
            .unwrap_or_default();

        Ok(BlockData {
            id: parse_block_number(header)?,
            hash,
            parent_hash: header_field(header, "parentHash")?,
            state_root: header_field(header, "stateRoot")?,
            extrinsics_root: header_field(header, "extrinsicsRoot")?,
            author_id: None,
            finalized: false,
            on_initialize,
            on_finalize,
            logs: decode_digest_logs(&logs_hex),
            extrinsics,
        })
    }

    pub async fn fetch_block_range(&self, ids: &[i64]) -> Result<Vec<BlockData>, ReaderError> {
        let mut fetched = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.fetch_block(id).await {
                Ok(block) => fetched.push(block),
                Err(source) => {
                    return Err(ReaderError::RangeAborted {
                        fetched,
                        source: Box::new(source),
                    });
                }
            }
        }
        Ok(fetched)
    }

    pub async fn ping(&self) -> bool {
        let request = self
            .rpc
            .request::<JsonValue>("chain_getHeader", rpc_params![]);
        matches!(tokio::time::timeout(PING_TIMEOUT, request).await, Ok(Ok(_)))
    }

    pub fn get_stats(&self) -> Stats {
        self.metrics.stats()
    }
}

/// Connect to the node with a CLI progress indicator.
/// Shows a live progress line that updates every second, independent of log
/// levels. Terminates after 60 seconds with a clear error message.
async fn connect_with_progress_logging(url: &str) -> Result<ReconnectingRpcClient, ReaderError> {
    use std::io::Write;

    let connect_future = ReconnectingRpcClient::builder()
        .retry_policy(
            ExponentialBackoff::from_millis(RECONNECT_INITIAL_DELAY.as_millis() as u64)
                .max_delay(RECONNECT_MAX_DELAY),
        )
        .request_timeout(REQUEST_TIMEOUT)
        .build(url.to_string());

    tokio::pin!(connect_future);

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.tick().await; // First tick is immediate, skip it

    let mut elapsed_secs = 0u64;
    const TIMEOUT_SECS: u64 = 60;

    // Show initial connection message
    eprint!("\rConnecting to {}...", url);
    let _ = std::io::stderr().flush();

    loop {
        tokio::select! {
            result = &mut connect_future => {
                // Clear the progress line
                eprint!("\r\x1b[K");
                let _ = std::io::stderr().flush();

                return result.map_err(|source| {
                    ReaderError::Rpc(subxt_rpcs::Error::Client(Box::new(source)))
                });
            }
            _ = interval.tick() => {
                elapsed_secs += 1;

                if elapsed_secs >= TIMEOUT_SECS {
                    // Clear line and print final error
                    eprintln!("\r\x1b[K");
                    eprintln!("Failed to connect to {} after {} seconds.", url, TIMEOUT_SECS);
                    eprintln!("Terminating: no active connection with the RPC node.");

                    return Err(ReaderError::ConnectionTimeout {
                        url: url.to_string(),
                        timeout_secs: TIMEOUT_SECS,
                    });
                }

                // Update progress line with elapsed time and status message
                let status = match elapsed_secs {
                    0..=9 => "",
                    10..=19 => " (taking longer than usual)",
                    20..=29 => " (taking significantly longer than expected)",
                    30..=39 => " (check if RPC node is running)",
                    _ => " (timing out soon)",
                };

                eprint!("\rConnecting to {}... {}s{}", url, elapsed_secs, status);
                let _ = std::io::stderr().flush();
            }
        }
    }
}

fn header_field(header: &JsonValue, field: &str) -> Result<String, ReaderError> {
    header
        .get(field)
        .and_then(JsonValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| ReaderError::UnexpectedResponse(format!("header field {field} missing")))
}

fn parse_block_number(header: &JsonValue) -> Result<i64, ReaderError> {
    let number = header
        .get("number")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| ReaderError::UnexpectedResponse("header number missing".into()))?;
    i64::from_str_radix(number.trim_start_matches("0x"), 16)
        .map_err(|e| ReaderError::UnexpectedResponse(format!("header number '{number}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_block_number() {
        assert_eq!(
            parse_block_number(&json!({ "number": "0x3039" })).unwrap(),
            12345
        );
        assert!(parse_block_number(&json!({ "number": "nope" })).is_err());
        assert!(parse_block_number(&json!({})).is_err());
    }

    #[test]
    fn test_header_field() {
        let header = json!({ "parentHash": "0xaa" });
        assert_eq!(header_field(&header, "parentHash").unwrap(), "0xaa");
        assert!(header_field(&header, "stateRoot").is_err());
    }
}
