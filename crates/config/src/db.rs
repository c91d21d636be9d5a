// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Unsupported database type '{0}'. Only 'postgres' is supported")]
    UnsupportedType(String),

    #[error("Database host cannot be empty")]
    EmptyHost,

    #[error("Database name cannot be empty")]
    EmptyName,

    #[error("max_open must be at least 1")]
    MaxOpenZero,
}

/// PostgreSQL connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    #[serde(rename = "type")]
    pub db_type: String,

    pub ip: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,

    /// Upper bound on open connections in the pool.
    pub max_open: u32,

    /// Connections kept idle in the pool.
    pub max_idle: u32,

    /// Maximum lifetime of a pooled connection, in seconds.
    pub conn_max_life: u64,

    /// Maximum idle time of a pooled connection, in seconds.
    pub conn_max_idle: u64,

    /// Place partitions on the dotidx_fast/dotidx_slow tablespaces. Disable
    /// for databases that do not have them (local development, CI).
    pub use_tablespaces: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            db_type: "postgres".to_string(),
            ip: "127.0.0.1".to_string(),
            port: 5432,
            user: "dotidx".to_string(),
            password: String::new(),
            name: "dotidx".to_string(),
            max_open: 25,
            max_idle: 5,
            conn_max_life: 300,
            conn_max_idle: 60,
            use_tablespaces: true,
        }
    }
}

impl DbConfig {
    /// Connection URL consumed by the sqlx pool.
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.ip, self.port, self.name
        )
    }

    pub(crate) fn validate(&self) -> Result<(), DbError> {
        if self.db_type != "postgres" {
            return Err(DbError::UnsupportedType(self.db_type.clone()));
        }
        if self.ip.is_empty() {
            return Err(DbError::EmptyHost);
        }
        if self.name.is_empty() {
            return Err(DbError::EmptyName);
        }
        if self.max_open == 0 {
            return Err(DbError::MaxOpenZero);
        }
        Ok(())
    }
}
