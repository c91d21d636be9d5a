// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    #[error("Invalid log level '{level}'. Must be one of: {valid_levels}")]
    InvalidLogLevel { level: String, valid_levels: String },

    #[error("Log write max file size must be at least 1KB (1024 bytes)")]
    MaxFileSizeTooSmall,

    #[error("Log write max files must be at least 1")]
    MaxFilesZero,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level. Valid values: trace, debug, info, warn, error.
    pub level: String,

    /// Output logs in JSON format.
    pub json: bool,

    /// Whether to write logs to a rotated log file.
    pub write: bool,

    /// Directory for the rotated log files.
    pub write_path: String,

    /// The max size one log file may reach (in bytes).
    pub write_max_file_size: u64,

    /// The max number of rotated log files to keep.
    pub write_max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            write: false,
            write_path: "./logs".to_string(),
            write_max_file_size: 5_242_880,
            write_max_files: 5,
        }
    }
}

impl LogConfig {
    pub(crate) fn validate(&self) -> Result<(), LogError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];

        if !valid_levels.contains(&self.level.as_str()) {
            return Err(LogError::InvalidLogLevel {
                level: self.level.clone(),
                valid_levels: valid_levels.join(", "),
            });
        }

        if self.write_max_file_size < 1024 {
            return Err(LogError::MaxFileSizeTooSmall);
        }

        if self.write_max_files == 0 {
            return Err(LogError::MaxFilesZero);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert!(!config.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_level() {
        let config = LogConfig {
            level: "verbose".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LogError::InvalidLogLevel { .. })
        ));
    }

    #[test]
    fn test_validate_tiny_file_size() {
        let config = LogConfig {
            write_max_file_size: 100,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LogError::MaxFileSizeTooSmall)
        ));
    }
}
