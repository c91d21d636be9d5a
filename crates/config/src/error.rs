use crate::{BatchError, DbError, LogError, ParachainError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error(transparent)]
    Parachain(#[from] ParachainError),

    #[error("No chain reader configured for relay '{relay}' chain '{chain}'")]
    UnknownChain { relay: String, chain: String },
}
