// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Live head following: a 1-second ticker polls the chain head and ingests
//! every id between the follower's cursor and the head, sequentially.
//!
//! Head lag is typically single-digit, so there is no batching here.
//! Followers for different chains run as independent tasks; within one
//! chain the [`ChainState`] owner serializes processing.

use super::{SchedulerError, fetch_and_save};
use crate::reader::ChainReader;
use crate::store::Store;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const TICK: Duration = Duration::from_secs(1);

/// Per-chain follower state: `current` is the next id to fetch, `head` the
/// last observed chain head. Owned exclusively by the follower loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainState {
    pub current: i64,
    pub head: i64,
}

pub struct LiveFollower {
    reader: Arc<ChainReader>,
    store: Arc<Store>,
    relay: String,
    chain: String,
    token: CancellationToken,
    state: ChainState,
}

impl LiveFollower {
    /// Create a follower starting at `start_from`, or at the current head
    /// when `None`.
    pub async fn new(
        reader: Arc<ChainReader>,
        store: Arc<Store>,
        relay: impl Into<String>,
        chain: impl Into<String>,
        start_from: Option<i64>,
        token: CancellationToken,
    ) -> Result<Self, SchedulerError> {
        let head = reader.head_id().await?;
        Ok(Self {
            reader,
            store,
            relay: relay.into(),
            chain: chain.into(),
            token,
            state: ChainState {
                current: start_from.unwrap_or(head),
                head,
            },
        })
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    /// Follow the head until cancelled.
    pub async fn run(&mut self) -> Result<(), SchedulerError> {
        super::ensure_partitions(
            &self.reader,
            &self.store,
            &self.relay,
            &self.chain,
            self.state.current,
            self.state.head,
        )
        .await?;

        tracing::info!(
            relay = %self.relay,
            chain = %self.chain,
            current = self.state.current,
            head = self.state.head,
            "Following chain head"
        );

        let mut ticker = tokio::time::interval(TICK);
        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if let Err(e) = self.tick().await {
                tracing::warn!(relay = %self.relay, chain = %self.chain, "Live tick failed: {e}");
            }
        }

        tracing::info!(
            relay = %self.relay,
            chain = %self.chain,
            current = self.state.current,
            "Live follower stopped"
        );
        Ok(())
    }

    /// One ticker round: refresh the head, then ingest sequentially up to it.
    async fn tick(&mut self) -> Result<(), SchedulerError> {
        self.state.head = self.reader.head_id().await?;

        while self.state.current <= self.state.head {
            if self.token.is_cancelled() {
                break;
            }
            let id = self.state.current;
            match fetch_and_save(&self.reader, &self.store, &self.relay, &self.chain, id).await {
                Ok(()) => {
                    tracing::debug!(relay = %self.relay, chain = %self.chain, block = id, "Ingested");
                    self.state.current += 1;
                }
                Err(e) => {
                    // Leave the cursor in place; the next tick retries, and
                    // the store upserts make re-observation harmless.
                    tracing::warn!(block = id, "Failed to ingest live block: {e}");
                    break;
                }
            }
        }
        Ok(())
    }
}
