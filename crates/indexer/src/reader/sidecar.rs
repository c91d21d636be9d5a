// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

//! HTTP sidecar reader.
//!
//! Talks to a substrate-api-sidecar style service: `GET /blocks/head`,
//! `GET /blocks/{id}` and `GET /blocks?range=a-b`. The range endpoint is only
//! used when the requested ids are strictly sequential.

use super::{BlockData, ChainReader, PING_TIMEOUT, ReaderError};
use crate::metrics::{Metrics, Stats};
use std::time::{Duration, Instant};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SidecarReader {
    base_url: String,
    client: reqwest::Client,
    metrics: Metrics,
}

impl SidecarReader {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ReaderError> {
        let base_url = base_url.into();
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            metrics: Metrics::new(format!("sidecar {base_url}")),
            base_url,
            client,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ReaderError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    pub async fn head_id(&self) -> Result<i64, ReaderError> {
        let start = Instant::now();
        let result: Result<BlockData, _> =
            self.get_json(&format!("{}/blocks/head", self.base_url)).await;
        self.metrics.record(start, 1, result.is_err());
        let head = result?;
        if head.id < 0 {
            return Err(ReaderError::UnexpectedResponse(format!(
                "negative head id {}",
                head.id
            )));
        }
        Ok(head.id)
    }

    pub async fn fetch_block(&self, id: i64) -> Result<BlockData, ReaderError> {
        let start = Instant::now();
        let result = self
            .get_json(&format!("{}/blocks/{id}", self.base_url))
            .await;
        self.metrics.record(start, 1, result.is_err());
        result
    }

    pub async fn fetch_block_range(&self, ids: &[i64]) -> Result<Vec<BlockData>, ReaderError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        if ChainReader::is_sequential(ids) {
            let start = Instant::now();
            let url = format!(
                "{}/blocks?range={}-{}",
                self.base_url,
                ids[0],
                ids[ids.len() - 1]
            );
            let result: Result<Vec<BlockData>, _> = self.get_json(&url).await;
            self.metrics.record(start, ids.len() as u64, result.is_err());
            return result;
        }

        // Non-sequential runs fall back to per-id fetches; a failure aborts
        // with the prefix fetched so far.
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
            .client
            .get(format!("{}/blocks/head", self.base_url))
            .timeout(PING_TIMEOUT)
            .send();
        matches!(
            tokio::time::timeout(PING_TIMEOUT, request).await,
            Ok(Ok(response)) if response.status().is_success()
        )
    }

    pub fn get_stats(&self) -> Stats {
        self.metrics.stats()
    }
}
