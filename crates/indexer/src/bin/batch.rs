// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Batch backfill entry point: ingest the configured id range for one
//! `(relay, chain)` pair, then exit.

use anyhow::Context;
use dotidx::reader::{ChainReader, RpcReader, SidecarReader};
use dotidx::scheduler::{Backfill, spawn_stats_logger};
use dotidx::store::Store;
use dotidx_config::{Args, DotidxConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse_args();
    let config = DotidxConfig::from_file(&args.conf)
        .with_context(|| format!("loading configuration from {}", args.conf))?;
    dotidx::logging::init(&config.dotidx_log)?;

    let parachain = config.parachain(&args.relay_chain, &args.chain)?.clone();
    tracing::info!(
        relay = %args.relay_chain,
        chain = %args.chain,
        sidecar = %parachain.sidecar_url(),
        rpc = %parachain.rpc_ws_url(),
        "Starting batch ingestion"
    );

    let token = CancellationToken::new();
    tokio::spawn({
        let token = token.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Received SIGINT, shutting down");
            token.cancel();
        }
    });

    let rpc = RpcReader::connect(parachain.rpc_ws_url())
        .await
        .context("connecting to the node RPC endpoint")?;
    let sidecar =
        SidecarReader::new(parachain.sidecar_url()).context("building the sidecar client")?;
    let reader = Arc::new(ChainReader::with_fallback(
        ChainReader::Rpc(rpc),
        ChainReader::Sidecar(sidecar),
    ));
    let store = Arc::new(
        Store::connect(&config.dotidx_db)
            .await
            .context("connecting to the database")?,
    );

    let stats_task = spawn_stats_logger(
        Arc::clone(&reader),
        Arc::clone(&store),
        Duration::from_secs(config.dotidx_batch.flush_timeout.max(1)),
        token.clone(),
    );

    let backfill = Backfill::new(
        Arc::clone(&reader),
        Arc::clone(&store),
        args.relay_chain.clone(),
        args.chain.clone(),
        config.dotidx_batch.clone(),
        token.clone(),
    );
    let summary = backfill.run().await.context("backfill failed")?;

    token.cancel();
    let _ = stats_task.await;

    tracing::info!("{}", reader.get_stats());
    tracing::info!("{}", store.get_stats());
    tracing::info!(
        saved = summary.saved,
        failed = summary.failed,
        cancelled = summary.cancelled,
        "Batch ingestion finished"
    );

    store.close().await;
    Ok(())
}
