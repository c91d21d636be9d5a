// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Walks decoded extrinsics and collects every on-chain address they
//! reference, for the address→block edge table.

use crate::address::is_valid_address;
use serde_json::Value;
use std::collections::BTreeSet;

/// Validation used on extraction candidates. Same rules as
/// [`is_valid_address`], with a relaxed fast path for the generic-substrate
/// prefix used by the test networks.
fn is_address_candidate(s: &str) -> bool {
    if s.len() >= 46 && s.len() <= 48 && s.starts_with('5') {
        return true;
    }
    is_valid_address(s)
}

/// Collect the deduplicated set of addresses referenced by a block's decoded
/// extrinsics.
///
/// The walk is a recursive descent over objects and arrays: object keys
/// containing `id` are checked as single string candidates, keys containing
/// `data` are checked element-wise when the value is an array, and everything
/// else is recursed into.
pub fn extract_addresses(extrinsics: &Value) -> Vec<String> {
    let mut found = BTreeSet::new();
    walk(extrinsics, &mut found);
    found.into_iter().collect()
}

fn walk(value: &Value, found: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let key_lower = key.to_lowercase();
                if key_lower.contains("id") {
                    if let Value::String(s) = child {
                        if is_address_candidate(s) {
                            found.insert(s.clone());
                        }
                        continue;
                    }
                }
                if key_lower.contains("data") {
                    if let Value::Array(items) = child {
                        for item in items {
                            match item {
                                Value::String(s) => {
                                    if is_address_candidate(s) {
                                        found.insert(s.clone());
                                    }
                                }
                                other => walk(other, found),
                            }
                        }
                        continue;
                    }
                }
                walk(child, found);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, found);
            }
        }
        _ => {}
    }
}
