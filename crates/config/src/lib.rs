// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

mod args;
mod batch;
mod db;
mod error;
mod log;
mod parachain;

pub use args::Args;
pub use batch::{BatchConfig, BatchError};
pub use db::{DbConfig, DbError};
pub use error::ConfigError;
pub use log::{LogConfig, LogError};
pub use parachain::{ParachainConfig, ParachainError};

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Main configuration struct, loaded from a TOML file.
///
/// ```toml
/// [dotidx_batch]
/// start_range = 1
/// end_range = -1
/// batch_size = 10
/// max_workers = 8
///
/// [dotidx_db]
/// type = "postgres"
/// ip = "127.0.0.1"
/// port = 5432
/// user = "dotidx"
/// password = "secret"
/// name = "dotidx"
///
/// [parachains.polkadot.polkadot]
/// chainreader_ip = "127.0.0.1"
/// chainreader_port = 8080
/// port_ws = 9944
/// port_rpc = 9933
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DotidxConfig {
    #[serde(default)]
    pub dotidx_batch: BatchConfig,

    #[serde(default)]
    pub dotidx_db: DbConfig,

    #[serde(default)]
    pub dotidx_log: LogConfig,

    /// Chain readers, keyed by relay chain name then chain name.
    #[serde(default)]
    pub parachains: BTreeMap<String, BTreeMap<String, ParachainConfig>>,
}

impl DotidxConfig {
    /// Load and validate a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|source| ConfigError::Read {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Look up the reader endpoints for a `(relay, chain)` pair.
    pub fn parachain(&self, relay: &str, chain: &str) -> Result<&ParachainConfig, ConfigError> {
        self.parachains
            .get(relay)
            .and_then(|chains| chains.get(chain))
            .ok_or_else(|| ConfigError::UnknownChain {
                relay: relay.to_string(),
                chain: chain.to_string(),
            })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.dotidx_batch.validate()?;
        self.dotidx_db.validate()?;
        self.dotidx_log.validate()?;
        for chains in self.parachains.values() {
            for parachain in chains.values() {
                parachain.validate()?;
            }
        }
        Ok(())
    }
}
