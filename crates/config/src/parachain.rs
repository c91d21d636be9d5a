// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParachainError {
    #[error("chainreader_ip cannot be empty")]
    EmptyHost,

    #[error("chainreader_port cannot be 0")]
    SidecarPortZero,

    #[error("port_ws cannot be 0")]
    WsPortZero,
}

/// Reader endpoints for one chain: the HTTP sidecar and the node's own
/// WebSocket/HTTP RPC ports.
#[derive(Debug, Clone, Deserialize)]
pub struct ParachainConfig {
    pub chainreader_ip: String,
    pub chainreader_port: u16,
    pub port_ws: u16,
    pub port_rpc: u16,
}

impl ParachainConfig {
    /// Base URL of the HTTP sidecar.
    pub fn sidecar_url(&self) -> String {
        format!("http://{}:{}", self.chainreader_ip, self.chainreader_port)
    }

    /// WebSocket URL of the node RPC endpoint.
    pub fn rpc_ws_url(&self) -> String {
        format!("ws://{}:{}", self.chainreader_ip, self.port_ws)
    }

    pub(crate) fn validate(&self) -> Result<(), ParachainError> {
        if self.chainreader_ip.is_empty() {
            return Err(ParachainError::EmptyHost);
        }
        if self.chainreader_port == 0 {
            return Err(ParachainError::SidecarPortZero);
        }
        if self.port_ws == 0 {
            return Err(ParachainError::WsPortZero);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ParachainConfig {
        ParachainConfig {
            chainreader_ip: "10.1.2.3".to_string(),
            chainreader_port: 8080,
            port_ws: 9944,
            port_rpc: 9933,
        }
    }

    #[test]
    fn test_urls() {
        let config = sample();
        assert_eq!(config.sidecar_url(), "http://10.1.2.3:8080");
        assert_eq!(config.rpc_ws_url(), "ws://10.1.2.3:9944");
    }

    #[test]
    fn test_validate_empty_host() {
        let config = ParachainConfig {
            chainreader_ip: String::new(),
            ..sample()
        };
        assert!(matches!(config.validate(), Err(ParachainError::EmptyHost)));
    }

    #[test]
    fn test_validate_zero_ws_port() {
        let config = ParachainConfig {
            port_ws: 0,
            ..sample()
        };
        assert!(matches!(config.validate(), Err(ParachainError::WsPortZero)));
    }
}
