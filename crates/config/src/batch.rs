// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("start_range must be non-negative, got {0}")]
    NegativeStart(i64),

    #[error("end_range must be -1 (follow head) or >= start_range, got {0}")]
    InvalidEnd(i64),

    #[error("batch_size must be at least 1")]
    BatchSizeZero,

    #[error("max_workers must be at least 1")]
    MaxWorkersZero,
}

/// Settings for the batch backfill scheduler.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// First block id to ingest.
    pub start_range: i64,

    /// Last block id to ingest; -1 means "up to the current head".
    pub end_range: i64,

    /// Maximum number of contiguous ids dispatched as one batch.
    pub batch_size: usize,

    /// Total worker budget, split between the single-block and batch pools.
    pub max_workers: usize,

    /// Seconds between metrics summary log lines.
    pub flush_timeout: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            start_range: 0,
            end_range: -1,
            batch_size: 10,
            max_workers: 8,
            flush_timeout: 30,
        }
    }
}

impl BatchConfig {
    pub(crate) fn validate(&self) -> Result<(), BatchError> {
        if self.start_range < 0 {
            return Err(BatchError::NegativeStart(self.start_range));
        }
        if self.end_range != -1 && self.end_range < self.start_range {
            return Err(BatchError::InvalidEnd(self.end_range));
        }
        if self.batch_size == 0 {
            return Err(BatchError::BatchSizeZero);
        }
        if self.max_workers == 0 {
            return Err(BatchError::MaxWorkersZero);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_batch_config() {
        let config = BatchConfig::default();
        assert_eq!(config.end_range, -1);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_workers, 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_negative_start() {
        let config = BatchConfig {
            start_range: -5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(BatchError::NegativeStart(-5))
        ));
    }

    #[test]
    fn test_validate_end_before_start() {
        let config = BatchConfig {
            start_range: 100,
            end_range: 50,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_workers() {
        let config = BatchConfig {
            max_workers: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BatchError::MaxWorkersZero)));
    }
}
