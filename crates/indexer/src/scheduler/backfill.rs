// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Batch backfill: split an id range into runs of ids missing from the
//! store and drain them through two worker pools.
//!
//! Isolated ids go to the single-block pool, contiguous runs to the batch
//! pool, where the sidecar's range endpoint makes sequential fetches cheap.
//! Channel sends and receives are bounded and every suspension point races
//! the cancellation token.

use super::{SchedulerError, fetch_and_save};
use crate::reader::{ChainReader, ReaderError};
use crate::store::Store;
use dotidx_config::BatchConfig;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Gap detection queries the store in windows of this many ids.
const WINDOW_STEP: i64 = 100_000;

#[derive(Debug, Default)]
struct Counters {
    dispatched_single: AtomicU64,
    dispatched_batches: AtomicU64,
    saved: AtomicU64,
    failed: AtomicU64,
}

/// Outcome of one backfill pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillSummary {
    pub dispatched_single: u64,
    pub dispatched_batches: u64,
    pub saved: u64,
    pub failed: u64,
    pub cancelled: bool,
}

pub struct Backfill {
    reader: Arc<ChainReader>,
    store: Arc<Store>,
    relay: String,
    chain: String,
    config: BatchConfig,
    token: CancellationToken,
}

impl Backfill {
    pub fn new(
        reader: Arc<ChainReader>,
        store: Arc<Store>,
        relay: impl Into<String>,
        chain: impl Into<String>,
        config: BatchConfig,
        token: CancellationToken,
    ) -> Self {
        Self {
            reader,
            store,
            relay: relay.into(),
            chain: chain.into(),
            config,
            token,
        }
    }

    /// Run one backfill pass over the configured range.
    pub async fn run(&self) -> Result<BackfillSummary, SchedulerError> {
        let start = self.config.start_range;
        let end = if self.config.end_range < 0 {
            self.reader.head_id().await?
        } else {
            self.config.end_range
        };
        if end < start {
            tracing::info!(start, end, "Nothing to backfill");
            return Ok(self.summary(false));
        }

        super::ensure_partitions(&self.reader, &self.store, &self.relay, &self.chain, start, end)
            .await?;

        let batch_size = self.config.batch_size;
        let workers_per_pool = (self.config.max_workers / 2).max(1);

        let (single_tx, single_rx) = async_channel::bounded::<i64>(batch_size);
        let (batch_tx, batch_rx) = async_channel::bounded::<Vec<i64>>(self.config.max_workers);

        let counters = Arc::new(Counters::default());
        let mut handles: Vec<JoinHandle<()>> = Vec::new();
        for _ in 0..workers_per_pool {
            handles.push(self.spawn_single_worker(single_rx.clone(), Arc::clone(&counters)));
            handles.push(self.spawn_batch_worker(batch_rx.clone(), Arc::clone(&counters)));
        }

        tracing::info!(
            relay = %self.relay,
            chain = %self.chain,
            start,
            end,
            workers = workers_per_pool * 2,
            batch_size,
            "Starting backfill"
        );

        let mut cancelled = false;
        let mut window_start = start;
        'windows: while window_start <= end {
            if self.token.is_cancelled() {
                cancelled = true;
                break;
            }
            let window_end = (window_start + WINDOW_STEP - 1).min(end);
            let existing = self
                .store
                .get_existing_blocks(&self.relay, &self.chain, window_start, window_end)
                .await;

            for run in plan_runs(window_start..=window_end, &existing, batch_size) {
                let sent = if run.len() == 1 {
                    counters.dispatched_single.fetch_add(1, Ordering::Relaxed);
                    self.send_cancellable(&single_tx, run[0]).await
                } else {
                    counters.dispatched_batches.fetch_add(1, Ordering::Relaxed);
                    self.send_cancellable(&batch_tx, run).await
                };
                if !sent {
                    cancelled = true;
                    break 'windows;
                }
            }
            window_start = window_end + 1;
        }

        // Closing the channels lets the workers drain and exit.
        drop(single_tx);
        drop(batch_tx);
        for handle in handles {
            let _ = handle.await;
        }

        let summary = BackfillSummary {
            cancelled,
            ..self.summary_from(&counters)
        };
        tracing::info!(
            relay = %self.relay,
            chain = %self.chain,
            saved = summary.saved,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Backfill pass finished"
        );
        Ok(summary)
    }

    /// Send racing the cancellation token. `false` means cancelled.
    async fn send_cancellable<T>(&self, tx: &async_channel::Sender<T>, item: T) -> bool {
        tokio::select! {
            _ = self.token.cancelled() => false,
            sent = tx.send(item) => sent.is_ok(),
        }
    }

    fn spawn_single_worker(
        &self,
        rx: async_channel::Receiver<i64>,
        counters: Arc<Counters>,
    ) -> JoinHandle<()> {
        let reader = Arc::clone(&self.reader);
        let store = Arc::clone(&self.store);
        let relay = self.relay.clone();
        let chain = self.chain.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            loop {
                let id = tokio::select! {
                    _ = token.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(id) => id,
                        Err(_) => break,
                    },
                };
                match fetch_and_save(&reader, &store, &relay, &chain, id).await {
                    Ok(()) => {
                        counters.saved.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        counters.failed.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(block = id, "Failed to ingest block: {e}");
                    }
                }
            }
        })
    }

    fn spawn_batch_worker(
        &self,
        rx: async_channel::Receiver<Vec<i64>>,
        counters: Arc<Counters>,
    ) -> JoinHandle<()> {
        let reader = Arc::clone(&self.reader);
        let store = Arc::clone(&self.store);
        let relay = self.relay.clone();
        let chain = self.chain.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            loop {
                let ids = tokio::select! {
                    _ = token.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(ids) => ids,
                        Err(_) => break,
                    },
                };
                let total = ids.len() as u64;
                let (blocks, fetch_failed) = match reader.fetch_block_range(&ids).await {
                    Ok(blocks) => (blocks, 0),
                    Err(ReaderError::RangeAborted { fetched, source }) => {
                        // Persist the prefix; the failed tail stays a gap for
                        // the next pass.
                        tracing::warn!(
                            first = ids.first(),
                            last = ids.last(),
                            fetched = fetched.len(),
                            "Range fetch aborted: {source}"
                        );
                        let missing = total - fetched.len() as u64;
                        (fetched, missing)
                    }
                    Err(e) => {
                        counters.failed.fetch_add(total, Ordering::Relaxed);
                        tracing::warn!(
                            first = ids.first(),
                            last = ids.last(),
                            "Failed to fetch batch: {e}"
                        );
                        continue;
                    }
                };
                counters.failed.fetch_add(fetch_failed, Ordering::Relaxed);

                match store.save(&blocks, &relay, &chain).await {
                    Ok(()) => {
                        counters.saved.fetch_add(blocks.len() as u64, Ordering::Relaxed);
                    }
                    Err(e) => {
                        // The transaction rolled back; drop the batch and let
                        // the loop resume with the next one.
                        counters.failed.fetch_add(blocks.len() as u64, Ordering::Relaxed);
                        tracing::warn!(
                            first = ids.first(),
                            last = ids.last(),
                            "Failed to save batch: {e}"
                        );
                    }
                }
            }
        })
    }

    fn summary(&self, cancelled: bool) -> BackfillSummary {
        BackfillSummary {
            dispatched_single: 0,
            dispatched_batches: 0,
            saved: 0,
            failed: 0,
            cancelled,
        }
    }

    fn summary_from(&self, counters: &Counters) -> BackfillSummary {
        BackfillSummary {
            dispatched_single: counters.dispatched_single.load(Ordering::Relaxed),
            dispatched_batches: counters.dispatched_batches.load(Ordering::Relaxed),
            saved: counters.saved.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            cancelled: false,
        }
    }
}

/// Split one window into dispatchable runs: ids already present are skipped,
/// contiguity breaks start a new run, and no run exceeds `batch_size`.
fn plan_runs(
    window: std::ops::RangeInclusive<i64>,
    existing: &HashSet<i64>,
    batch_size: usize,
) -> Vec<Vec<i64>> {
    let mut runs = Vec::new();
    let mut current: Vec<i64> = Vec::new();

    for id in window {
        if existing.contains(&id) {
            if !current.is_empty() {
                runs.push(std::mem::take(&mut current));
            }
            continue;
        }
        if let Some(&last) = current.last() {
            if id != last + 1 {
                runs.push(std::mem::take(&mut current));
            }
        }
        current.push(id);
        if current.len() >= batch_size {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_runs_empty_store() {
        let runs = plan_runs(1..=5, &HashSet::new(), 2);
        assert_eq!(runs, vec![vec![1, 2], vec![3, 4], vec![5]]);
    }

    #[test]
    fn test_plan_runs_skips_existing_evens() {
        let existing: HashSet<i64> = [2, 4].into_iter().collect();
        let runs = plan_runs(1..=5, &existing, 2);
        // Isolated ids become single-element runs for the single-block pool.
        assert_eq!(runs, vec![vec![1], vec![3], vec![5]]);
    }

    #[test]
    fn test_plan_runs_contiguous_batching() {
        let runs = plan_runs(10..=19, &HashSet::new(), 4);
        assert_eq!(
            runs,
            vec![vec![10, 11, 12, 13], vec![14, 15, 16, 17], vec![18, 19]]
        );
        assert!(runs.iter().all(|run| run.len() > 1));
    }

    #[test]
    fn test_plan_runs_everything_present() {
        let existing: HashSet<i64> = (1..=5).collect();
        assert!(plan_runs(1..=5, &existing, 3).is_empty());
    }

    #[test]
    fn test_plan_runs_gap_in_middle() {
        let existing: HashSet<i64> = [13].into_iter().collect();
        let runs = plan_runs(10..=16, &existing, 10);
        assert_eq!(runs, vec![vec![10, 11, 12], vec![14, 15, 16]]);
    }
}
