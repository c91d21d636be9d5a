// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Sliding-window latency and rate tracking for chain readers and the store.
//!
//! Each [`Metrics`] instance owns four windowed buckets (1m, 5m, 1h, 24h). A
//! bucket resets itself lazily: the first `record` after its window has
//! elapsed starts a fresh window.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

const WINDOWS: [(&str, Duration); 4] = [
    ("1m", Duration::from_secs(60)),
    ("5m", Duration::from_secs(5 * 60)),
    ("1h", Duration::from_secs(60 * 60)),
    ("24h", Duration::from_secs(24 * 60 * 60)),
];

#[derive(Debug, Clone)]
struct BucketInner {
    count: u64,
    failures: u64,
    total_time: Duration,
    min: Duration,
    max: Duration,
    started_at: Instant,
}

impl BucketInner {
    fn fresh() -> Self {
        Self {
            count: 0,
            failures: 0,
            total_time: Duration::ZERO,
            min: Duration::MAX,
            max: Duration::ZERO,
            started_at: Instant::now(),
        }
    }
}

#[derive(Debug)]
struct Bucket {
    label: &'static str,
    window: Duration,
    inner: Mutex<BucketInner>,
}

impl Bucket {
    fn new(label: &'static str, window: Duration) -> Self {
        Self {
            label,
            window,
            inner: Mutex::new(BucketInner::fresh()),
        }
    }

    fn record(&self, start: Instant, count: u64, failed: bool) {
        let duration = start.elapsed();
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if inner.started_at.elapsed() > self.window {
            *inner = BucketInner::fresh();
        }

        if failed {
            inner.failures += count;
            return;
        }

        inner.count += count;
        inner.total_time += duration;
        // Batch operations contribute their per-item latency to the tails.
        let per_item = duration / count.max(1) as u32;
        if per_item < inner.min {
            inner.min = per_item;
        }
        if per_item > inner.max {
            inner.max = per_item;
        }
    }

    fn snapshot(&self) -> BucketStats {
        let inner = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let elapsed_ms = inner.started_at.elapsed().as_millis().max(1) as u64;
        let rate = inner.count as f64 * 1000.0 / elapsed_ms as f64;
        let attempts = inner.count + inner.failures;
        let failure_rate = if attempts == 0 {
            0.0
        } else {
            inner.failures as f64 / attempts as f64
        };
        let avg = if inner.count == 0 {
            Duration::ZERO
        } else {
            inner.total_time / inner.count as u32
        };

        BucketStats {
            window: self.label,
            count: inner.count,
            failures: inner.failures,
            rate,
            failure_rate,
            min: if inner.min == Duration::MAX {
                Duration::ZERO
            } else {
                inner.min
            },
            avg,
            max: inner.max,
        }
    }
}

/// Snapshot of a single windowed bucket.
#[derive(Debug, Clone)]
pub struct BucketStats {
    pub window: &'static str,
    pub count: u64,
    pub failures: u64,
    pub rate: f64,
    pub failure_rate: f64,
    pub min: Duration,
    pub avg: Duration,
    pub max: Duration,
}

/// Snapshot over all four windows, as returned by `get_stats`.
#[derive(Debug, Clone)]
pub struct Stats {
    pub name: String,
    pub buckets: Vec<BucketStats>,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.name)?;
        for b in &self.buckets {
            write!(
                f,
                " [{} n={} fail={} {:.1}/s min={:?} avg={:?} max={:?}]",
                b.window, b.count, b.failures, b.rate, b.min, b.avg, b.max
            )?;
        }
        Ok(())
    }
}

/// Latency/rate/failure tracking for one instrumented component.
#[derive(Debug)]
pub struct Metrics {
    name: String,
    buckets: Vec<Bucket>,
}

impl Metrics {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            buckets: WINDOWS
                .iter()
                .map(|&(label, window)| Bucket::new(label, window))
                .collect(),
        }
    }

    /// Record one operation covering `count` items, started at `start`.
    ///
    /// A failed operation counts all its items as failures and contributes
    /// nothing to the latency tails.
    pub fn record(&self, start: Instant, count: u64, failed: bool) {
        for bucket in &self.buckets {
            bucket.record(start, count, failed);
        }
    }

    pub fn stats(&self) -> Stats {
        Stats {
            name: self.name.clone(),
            buckets: self.buckets.iter().map(Bucket::snapshot).collect(),
        }
    }
}

/// Percentile over a caller-provided sample slice: sort and pick
/// `floor(p * n) - 1`, clamped into range. `p` is a fraction in `[0, 1]`.
pub fn percentile(samples: &mut [f64], p: f64) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = ((p * samples.len() as f64).floor() as isize - 1)
        .clamp(0, samples.len() as isize - 1) as usize;
    Some(samples[idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts_successes_and_failures() {
        let metrics = Metrics::new("reader");
        let start = Instant::now();
        metrics.record(start, 3, false);
        metrics.record(start, 2, true);

        let stats = metrics.stats();
        assert_eq!(stats.buckets.len(), 4);
        for bucket in &stats.buckets {
            assert_eq!(bucket.count, 3);
            assert_eq!(bucket.failures, 2);
            assert!((bucket.failure_rate - 0.4).abs() < 1e-9);
        }
    }

    #[test]
    fn test_batch_contributes_per_item_tails() {
        let metrics = Metrics::new("store");
        let start = Instant::now() - Duration::from_millis(100);
        metrics.record(start, 10, false);

        let stats = metrics.stats();
        let bucket = &stats.buckets[0];
        // 100ms over 10 items: the tails see ~10ms per item.
        assert!(bucket.max < Duration::from_millis(40));
        assert!(bucket.min > Duration::ZERO);
    }

    #[test]
    fn test_failure_rate_zero_when_empty() {
        let metrics = Metrics::new("idle");
        let bucket = &metrics.stats().buckets[0];
        assert_eq!(bucket.count, 0);
        assert_eq!(bucket.failure_rate, 0.0);
        assert_eq!(bucket.min, Duration::ZERO);
    }

    #[test]
    fn test_percentile_sort_and_pick() {
        let mut samples = vec![5.0, 1.0, 4.0, 2.0, 3.0];
        assert_eq!(percentile(&mut samples, 0.5), Some(2.0));
        assert_eq!(percentile(&mut samples, 1.0), Some(5.0));
        assert_eq!(percentile(&mut samples, 0.0), Some(1.0));
    }

    #[test]
    fn test_percentile_empty() {
        assert_eq!(percentile(&mut [], 0.5), None);
    }
}
