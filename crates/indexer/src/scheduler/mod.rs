// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Work scheduling: batch backfill over id ranges and live head following.

mod backfill;
mod live;

pub use backfill::{Backfill, BackfillSummary};
pub use live::{ChainState, LiveFollower};

use crate::reader::{ChainReader, ReaderError};
use crate::store::{Store, StoreError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Reader(#[from] ReaderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fetch one block and persist it. The single-block worker and the live
/// follower share this path; failures are reported, not retried, since the
/// id stays absent from the store and the next backfill pass re-dispatches
/// it.
pub(crate) async fn fetch_and_save(
    reader: &ChainReader,
    store: &Store,
    relay: &str,
    chain: &str,
    id: i64,
) -> Result<(), SchedulerError> {
    let block = reader.fetch_block(id).await?;
    store.save(std::slice::from_ref(&block), relay, chain).await?;
    Ok(())
}

/// Ensure partitions exist for the projected `created_at` range of the ids
/// about to be enqueued. Real timestamps are observed from the boundary
/// blocks when they can be fetched; the synthetic fallback covers the rest.
pub(crate) async fn ensure_partitions(
    reader: &Arc<ChainReader>,
    store: &Store,
    relay: &str,
    chain: &str,
    start: i64,
    end: i64,
) -> Result<(), SchedulerError> {
    let observe = |id: i64| {
        let reader = Arc::clone(reader);
        let relay = relay.to_string();
        async move {
            match reader.fetch_block(id).await {
                Ok(block) => crate::store::resolved_timestamp(&block, &relay),
                Err(e) => {
                    tracing::debug!(block = id, "Boundary fetch for partitioning failed: {e}");
                    crate::store::synthetic_timestamp(&relay, id)
                }
            }
        }
    };
    let (first_ts, last_ts) = tokio::join!(observe(start), observe(end));
    store
        .create_tables(relay, chain, Some(first_ts), Some(last_ts))
        .await?;
    Ok(())
}

/// Log reader and store metrics summaries on a fixed interval until the
/// token fires.
pub fn spawn_stats_logger(
    reader: Arc<ChainReader>,
    store: Arc<Store>,
    every: Duration,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    tracing::info!("{}", reader.get_stats());
                    tracing::info!("{}", store.get_stats());
                }
            }
        }
    })
}
