// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Chain readers: where blocks come from.
//!
//! A reader exposes one capability set — head id, single block, block range,
//! ping, stats — over three variants: the HTTP sidecar, the node's own
//! WebSocket RPC, and a fallback composition of a primary and a secondary.

mod block;
mod decode;
mod fallback;
mod rpc;
mod sidecar;

pub use block::BlockData;
pub use rpc::RpcReader;
pub use sidecar::SidecarReader;

use crate::metrics::Stats;
use std::time::Duration;
use thiserror::Error;

/// Hard deadline on availability pings.
pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC request failed: {0}")]
    Rpc(#[from] subxt_rpcs::Error),

    #[error("Connection to {url} timed out after {timeout_secs} seconds")]
    ConnectionTimeout { url: String, timeout_secs: u64 },

    #[error("Block {0} not found")]
    BlockNotFound(i64),

    #[error("Failed to decode runtime metadata for spec version {spec_version}: {reason}")]
    MetadataDecode { spec_version: u32, reason: String },

    #[error("Failed to decode block {block}: {reason}")]
    BlockDecode { block: i64, reason: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Range fetch aborted after {} blocks: {source}", fetched.len())]
    RangeAborted {
        /// Blocks successfully fetched before the failure.
        fetched: Vec<BlockData>,
        #[source]
        source: Box<ReaderError>,
    },

    #[error("All chain readers failed; primary: {primary}; secondary: {secondary}")]
    AllReadersFailed {
        primary: Box<ReaderError>,
        secondary: Box<ReaderError>,
    },
}

/// Tagged dispatch over the reader variants.
///
/// The fallback variant composes two boxed readers, trying every operation
/// on the primary first and retrying on the secondary.
pub enum ChainReader {
    Sidecar(SidecarReader),
    Rpc(RpcReader),
    Fallback {
        primary: Box<ChainReader>,
        secondary: Box<ChainReader>,
    },
}

impl ChainReader {
    /// Compose a primary and a secondary reader into a fallback reader.
    pub fn with_fallback(primary: ChainReader, secondary: ChainReader) -> Self {
        Self::Fallback {
            primary: Box::new(primary),
            secondary: Box::new(secondary),
        }
    }

    /// Current chain head id.
    pub async fn head_id(&self) -> Result<i64, ReaderError> {
        match self {
            Self::Sidecar(reader) => reader.head_id().await,
            Self::Rpc(reader) => reader.head_id().await,
            Self::Fallback { primary, secondary } => {
                fallback::head_id(primary, secondary).await
            }
        }
    }

    /// Fetch one fully populated block.
    pub async fn fetch_block(&self, id: i64) -> Result<BlockData, ReaderError> {
        match self {
            Self::Sidecar(reader) => reader.fetch_block(id).await,
            Self::Rpc(reader) => reader.fetch_block(id).await,
            Self::Fallback { primary, secondary } => {
                fallback::fetch_block(primary, secondary, id).await
            }
        }
    }

    /// Fetch a set of blocks. Atomic per element only: a failure aborts the
    /// range, returning the accumulated prefix inside the error.
    pub async fn fetch_block_range(&self, ids: &[i64]) -> Result<Vec<BlockData>, ReaderError> {
        match self {
            Self::Sidecar(reader) => reader.fetch_block_range(ids).await,
            Self::Rpc(reader) => reader.fetch_block_range(ids).await,
            Self::Fallback { primary, secondary } => {
                fallback::fetch_block_range(primary, secondary, ids).await
            }
        }
    }

    /// Availability probe with a hard [`PING_TIMEOUT`] deadline. A fallback
    /// reader is available if either side is.
    pub async fn ping(&self) -> bool {
        match self {
            Self::Sidecar(reader) => reader.ping().await,
            Self::Rpc(reader) => reader.ping().await,
            Self::Fallback { primary, secondary } => fallback::ping(primary, secondary).await,
        }
    }

    /// Metrics snapshot. For a fallback reader these are the primary's.
    pub fn get_stats(&self) -> Stats {
        match self {
            Self::Sidecar(reader) => reader.get_stats(),
            Self::Rpc(reader) => reader.get_stats(),
            Self::Fallback { primary, .. } => primary.get_stats(),
        }
    }

    /// Whether the ids form a strictly sequential ascending run.
    pub(crate) fn is_sequential(ids: &[i64]) -> bool {
        ids.windows(2).all(|pair| pair[1] == pair[0] + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_sequential() {
        assert!(ChainReader::is_sequential(&[5]));
        assert!(ChainReader::is_sequential(&[1, 2, 3]));
        assert!(!ChainReader::is_sequential(&[1, 3, 4]));
        assert!(!ChainReader::is_sequential(&[3, 2, 1]));
        assert!(ChainReader::is_sequential(&[]));
    }
}
