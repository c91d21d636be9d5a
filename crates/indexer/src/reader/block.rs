// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::address;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One fully populated block, as produced by any reader variant and consumed
/// by the store. Field names mirror the sidecar JSON so the HTTP variant
/// deserializes it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockData {
    /// Block number. Not unique across forks; `(hash, created_at)` is the
    /// storage identity.
    #[serde(rename = "number", alias = "id", deserialize_with = "de_block_id")]
    pub id: i64,

    pub hash: String,
    pub parent_hash: String,
    pub state_root: String,
    pub extrinsics_root: String,

    #[serde(default)]
    pub author_id: Option<String>,

    #[serde(default)]
    pub finalized: bool,

    #[serde(default)]
    pub on_initialize: Value,

    #[serde(default)]
    pub on_finalize: Value,

    #[serde(default)]
    pub logs: Value,

    #[serde(default)]
    pub extrinsics: Value,
}

impl BlockData {
    /// Timestamp extracted from the Timestamp.set inherent, when present.
    pub fn timestamp(&self) -> Option<String> {
        address::extract_timestamp(&self.extrinsics.to_string())
    }
}

/// The sidecar serializes block numbers as strings; raw RPC headers as hex or
/// integers. Accept all three.
fn de_block_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom("block number out of range")),
        Value::String(s) => {
            if let Some(hex) = s.strip_prefix("0x") {
                i64::from_str_radix(hex, 16).map_err(serde::de::Error::custom)
            } else {
                s.parse().map_err(serde::de::Error::custom)
            }
        }
        _ => Err(serde::de::Error::custom("block number must be a number or string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_sidecar_shape() {
        let raw = json!({
            "number": "12345",
            "hash": "0xaa",
            "parentHash": "0xbb",
            "stateRoot": "0xcc",
            "extrinsicsRoot": "0xdd",
            "authorId": "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY",
            "finalized": true,
            "onInitialize": {"events": []},
            "onFinalize": {"events": []},
            "logs": [],
            "extrinsics": []
        });
        let block: BlockData = serde_json::from_value(raw).unwrap();
        assert_eq!(block.id, 12345);
        assert!(block.finalized);
        assert!(block.author_id.is_some());
    }

    #[test]
    fn test_deserialize_id_alias_and_hex() {
        let block: BlockData = serde_json::from_value(json!({
            "id": "0x3039",
            "hash": "0xaa",
            "parentHash": "0xbb",
            "stateRoot": "0xcc",
            "extrinsicsRoot": "0xdd"
        }))
        .unwrap();
        assert_eq!(block.id, 0x3039);
        assert!(block.author_id.is_none());
        assert!(!block.finalized);
    }

    #[test]
    fn test_timestamp_from_extrinsics() {
        let mut block: BlockData = serde_json::from_value(json!({
            "number": 7,
            "hash": "0xaa",
            "parentHash": "0xbb",
            "stateRoot": "0xcc",
            "extrinsicsRoot": "0xdd"
        }))
        .unwrap();
        assert!(block.timestamp().is_none());

        block.extrinsics = json!([
            { "method": { "pallet": "timestamp", "method": "set" },
              "args": { "now": "1600000000000" } }
        ]);
        assert_eq!(block.timestamp().unwrap(), "2020-09-13 12:26:40.0000");
    }
}
