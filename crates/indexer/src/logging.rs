// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tracing initialization: console output, optional JSON format and an
//! optional rotated log file.

use dotidx_config::LogConfig;
use rolling_file::{BasicRollingFileAppender, RollingConditionBasic};
use std::path::PathBuf;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log level '{level}': {source}")]
    InvalidLogLevel {
        level: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("Failed to create log directory or file appender: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to install global subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Initialize tracing from the `[dotidx_log]` configuration section.
pub fn init(config: &LogConfig) -> Result<(), LoggingError> {
    let filter =
        EnvFilter::try_new(&config.level).map_err(|source| LoggingError::InvalidLogLevel {
            level: config.level.clone(),
            source,
        })?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    if config.json {
        layers.push(fmt::layer().json().boxed());
    } else {
        layers.push(fmt::layer().boxed());
    }

    if config.write {
        std::fs::create_dir_all(&config.write_path)?;
        let appender = BasicRollingFileAppender::new(
            PathBuf::from(&config.write_path).join("dotidx.log"),
            RollingConditionBasic::new().max_size(config.write_max_file_size),
            config.write_max_files,
        )?;
        layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(appender))
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()?;
    Ok(())
}
