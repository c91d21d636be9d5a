// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Fallback composition: try the primary reader, retry on the secondary,
//! combine the errors when both fail.

use super::{BlockData, ChainReader, ReaderError};

fn both_failed(primary: ReaderError, secondary: ReaderError) -> ReaderError {
    ReaderError::AllReadersFailed {
        primary: Box::new(primary),
        secondary: Box::new(secondary),
    }
}

pub(super) async fn head_id(
    primary: &ChainReader,
    secondary: &ChainReader,
) -> Result<i64, ReaderError> {
    match Box::pin(primary.head_id()).await {
        Ok(head) => Ok(head),
        Err(primary_err) => {
            tracing::warn!("Primary reader failed to fetch head: {primary_err}");
            Box::pin(secondary.head_id())
                .await
                .map_err(|secondary_err| both_failed(primary_err, secondary_err))
        }
    }
}

pub(super) async fn fetch_block(
    primary: &ChainReader,
    secondary: &ChainReader,
    id: i64,
) -> Result<BlockData, ReaderError> {
    match Box::pin(primary.fetch_block(id)).await {
        Ok(block) => Ok(block),
        Err(primary_err) => {
            tracing::warn!(block = id, "Primary reader failed: {primary_err}");
            Box::pin(secondary.fetch_block(id))
                .await
                .map_err(|secondary_err| both_failed(primary_err, secondary_err))
        }
    }
}

pub(super) async fn fetch_block_range(
    primary: &ChainReader,
    secondary: &ChainReader,
    ids: &[i64],
) -> Result<Vec<BlockData>, ReaderError> {
    match Box::pin(primary.fetch_block_range(ids)).await {
        Ok(blocks) => Ok(blocks),
        Err(primary_err) => {
            tracing::warn!(
                blocks = ids.len(),
                "Primary reader failed on range: {primary_err}"
            );
            Box::pin(secondary.fetch_block_range(ids))
                .await
                .map_err(|secondary_err| both_failed(primary_err, secondary_err))
        }
    }
}

pub(super) async fn ping(primary: &ChainReader, secondary: &ChainReader) -> bool {
    if Box::pin(primary.ping()).await {
        return true;
    }
    Box::pin(secondary.ping()).await
}
