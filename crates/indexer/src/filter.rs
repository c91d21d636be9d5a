// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Query-time projection of decoded extrinsics against an address and
//! pallet/method matcher. Shares the decoded JSON representation with the
//! reader; runs only when serving queries, never during ingestion.

use serde_json::{Map, Value};

/// Where to look for the matched address inside a matching node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchTarget {
    /// The `data` array of the event carries the address.
    DataArray,
    /// `args.target.id` carries the address (vesting calls).
    TargetId,
}

/// Matcher over decoded extrinsic/event nodes. All populated fields must
/// match; `None` fields match anything.
#[derive(Debug, Clone)]
pub struct EventMatcher {
    pub address: Option<String>,
    pub pallet: Option<String>,
    pub method: Option<String>,
    target: MatchTarget,
}

impl EventMatcher {
    pub fn new(address: Option<String>, pallet: Option<String>, method: Option<String>) -> Self {
        Self {
            address,
            pallet,
            method,
            target: MatchTarget::DataArray,
        }
    }

    /// Matcher for balance transfers and related events.
    pub fn balances(address: impl Into<String>) -> Self {
        Self::new(Some(address.into()), Some("balances".to_string()), None)
    }

    /// Matcher for staking rewards, bonds and slashes.
    pub fn staking(address: impl Into<String>) -> Self {
        Self::new(Some(address.into()), Some("staking".to_string()), None)
    }

    /// Matcher for vesting calls, which reference the account via
    /// `args.target.id` rather than the event data array.
    pub fn vesting(address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            pallet: Some("vesting".to_string()),
            method: None,
            target: MatchTarget::TargetId,
        }
    }

    fn method_matches(&self, node: &Map<String, Value>) -> bool {
        let Some(method) = node.get("method").and_then(Value::as_object) else {
            return false;
        };
        if let Some(want) = &self.pallet {
            let pallet = method.get("pallet").and_then(Value::as_str).unwrap_or("");
            if !pallet.eq_ignore_ascii_case(want) {
                return false;
            }
        }
        if let Some(want) = &self.method {
            let name = method.get("method").and_then(Value::as_str).unwrap_or("");
            if !name.eq_ignore_ascii_case(want) {
                return false;
            }
        }
        true
    }

    fn address_matches(&self, node: &Map<String, Value>) -> bool {
        let Some(address) = &self.address else {
            return true;
        };
        match self.target {
            MatchTarget::DataArray => node
                .get("data")
                .and_then(Value::as_array)
                .is_some_and(|data| {
                    data.iter()
                        .any(|item| item.as_str().is_some_and(|s| s == address))
                }),
            MatchTarget::TargetId => node
                .get("args")
                .and_then(|args| args.get("target"))
                .and_then(|target| target.get("id"))
                .and_then(Value::as_str)
                .is_some_and(|s| s == address),
        }
    }

    fn matches(&self, node: &Map<String, Value>) -> bool {
        self.method_matches(node) && self.address_matches(node)
    }
}

/// Project `value` down to the nodes matched by `matcher`, preserving the
/// surrounding shape. The boolean reports whether anything matched, so
/// callers can skip blocks with no hits.
pub fn filter_extrinsics(value: &Value, matcher: &EventMatcher) -> (Value, bool) {
    match project(value, matcher) {
        Some(projected) => (projected, true),
        None => (empty_like(value), false),
    }
}

fn empty_like(value: &Value) -> Value {
    match value {
        Value::Array(_) => Value::Array(Vec::new()),
        _ => Value::Object(Map::new()),
    }
}

fn project(value: &Value, matcher: &EventMatcher) -> Option<Value> {
    match value {
        Value::Object(map) => {
            if matcher.matches(map) {
                return Some(value.clone());
            }
            let mut kept = Map::new();
            for (key, child) in map {
                if let Some(projected) = project(child, matcher) {
                    kept.insert(key.clone(), projected);
                }
            }
            (!kept.is_empty()).then(|| Value::Object(kept))
        }
        Value::Array(items) => {
            let kept: Vec<Value> = items
                .iter()
                .filter_map(|item| project(item, matcher))
                .collect();
            (!kept.is_empty()).then(|| Value::Array(kept))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
    const BOB: &str = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty";

    fn sample_block() -> Value {
        json!({
            "extrinsics": [
                {
                    "method": { "pallet": "balances", "method": "transfer" },
                    "events": [
                        { "method": { "pallet": "balances", "method": "Transfer" },
                          "data": [ALICE, BOB, "1000"] },
                        { "method": { "pallet": "system", "method": "ExtrinsicSuccess" },
                          "data": [] }
                    ]
                },
                {
                    "method": { "pallet": "staking", "method": "bond" },
                    "events": [
                        { "method": { "pallet": "staking", "method": "Bonded" },
                          "data": [BOB, "500"] }
                    ]
                }
            ]
        })
    }

    #[test]
    fn test_balances_filter_finds_transfer() {
        let (projected, found) = filter_extrinsics(&sample_block(), &EventMatcher::balances(ALICE));
        assert!(found);
        let text = projected.to_string();
        assert!(text.contains("Transfer"));
        assert!(!text.contains("Bonded"));
    }

    #[test]
    fn test_staking_filter_finds_bond_only() {
        let (projected, found) = filter_extrinsics(&sample_block(), &EventMatcher::staking(BOB));
        assert!(found);
        let text = projected.to_string();
        assert!(text.contains("Bonded"));
        assert!(!text.contains("Transfer"));
    }

    #[test]
    fn test_no_match_reports_not_found() {
        let matcher = EventMatcher::balances("5Unknown");
        let (projected, found) = filter_extrinsics(&sample_block(), &matcher);
        assert!(!found);
        assert_eq!(projected, json!({}));
    }

    #[test]
    fn test_method_filter_narrowing() {
        let matcher = EventMatcher::new(
            None,
            Some("system".to_string()),
            Some("extrinsicsuccess".to_string()),
        );
        let (projected, found) = filter_extrinsics(&sample_block(), &matcher);
        assert!(found);
        assert!(projected.to_string().contains("ExtrinsicSuccess"));
    }

    #[test]
    fn test_vesting_filter_matches_target_id() {
        let block = json!({
            "extrinsics": [
                { "method": { "pallet": "vesting", "method": "vest" },
                  "args": { "target": { "id": ALICE } } }
            ]
        });
        let (_, found) = filter_extrinsics(&block, &EventMatcher::vesting(ALICE));
        assert!(found);
        let (_, found_bob) = filter_extrinsics(&block, &EventMatcher::vesting(BOB));
        assert!(!found_bob);
    }
}
