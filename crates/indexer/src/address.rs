// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

//! Address and codec utilities: base58/SS58 decoding, address validation and
//! timestamp extraction from encoded extrinsics.

use blake2::{Blake2b512, Digest};
use chrono::DateTime;
use regex::Regex;
use std::sync::LazyLock;

/// Prefix hashed into every SS58 checksum.
const SS58_PREFIX: &[u8] = b"SS58PRE";

static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{46,48}$").expect("address regex is valid")
});

static NUMERIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+$").expect("numeric regex is valid"));

static TIMESTAMP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""now"\s*:\s*"?(\d+)"?"#).expect("timestamp regex is valid"));

/// Decode a base58 string, `None` on any invalid character.
pub fn base58_decode(s: &str) -> Option<Vec<u8>> {
    bs58::decode(s).into_vec().ok()
}

/// Checksum length for a given total (prefix + payload + checksum) length.
///
/// Anything outside the table is not a valid SS58 envelope.
fn checksum_len(total: usize) -> Option<usize> {
    match total {
        3 | 4 | 6 | 10 => Some(1),
        5 | 7 | 11 | 35 => Some(2),
        8 | 12 => Some(3),
        9 | 13 => Some(4),
        14 => Some(5),
        15 => Some(6),
        16 => Some(7),
        17 => Some(8),
        _ => None,
    }
}

fn ss58_checksum(body: &[u8]) -> [u8; 64] {
    let mut hasher = Blake2b512::new();
    hasher.update(SS58_PREFIX);
    hasher.update(body);
    hasher.finalize().into()
}

/// Invert the SS58 envelope: base58-decode, check the network prefix byte,
/// verify the blake2b-512 checksum, and return the raw payload.
///
/// Any failure yields `None`; this never panics on untrusted input.
pub fn ss58_decode(address: &str, network_prefix: u8) -> Option<Vec<u8>> {
    let data = base58_decode(address)?;
    let ck_len = checksum_len(data.len())?;
    if data[0] != network_prefix {
        return None;
    }

    let body = &data[..data.len() - ck_len];
    let checksum = &data[data.len() - ck_len..];
    let expected = ss58_checksum(body);
    if checksum != &expected[..ck_len] {
        return None;
    }

    Some(body[1..].to_vec())
}

/// Re-apply the SS58 envelope around a raw payload.
pub fn ss58_encode(payload: &[u8], network_prefix: u8) -> String {
    let mut body = Vec::with_capacity(payload.len() + 1);
    body.push(network_prefix);
    body.extend_from_slice(payload);

    // Account ids carry a two-byte checksum, short payloads one byte.
    let ck_len = if payload.len() == 32 || payload.len() == 33 {
        2
    } else {
        1
    };
    let checksum = ss58_checksum(&body);
    body.extend_from_slice(&checksum[..ck_len]);

    bs58::encode(body).into_string()
}

/// Cheap shape check for SS58 addresses found in decoded extrinsics.
///
/// Rejects hex-prefixed hashes and pure numerics before the alphabet/length
/// check so the extractor can discard the common non-address strings fast.
pub fn is_valid_address(s: &str) -> bool {
    if s.starts_with("0x") || NUMERIC_RE.is_match(s) {
        return false;
    }
    ADDRESS_RE.is_match(s)
}

/// Scan an encoded extrinsics blob for the first `"now":"<millis>"` value
/// (the Timestamp.set inherent) and format it with sub-second precision.
///
/// Returns `None` when the block carries no timestamp; callers supply a
/// deterministic fallback.
pub fn extract_timestamp(extrinsics_json: &str) -> Option<String> {
    let captures = TIMESTAMP_RE.captures(extrinsics_json)?;
    let millis: i64 = captures.get(1)?.as_str().parse().ok()?;
    let ts = DateTime::from_timestamp_millis(millis)?;
    // Four fractional digits; chrono's %.Nf only supports 3/6/9.
    Some(format!(
        "{}.{:03}0",
        ts.format("%Y-%m-%d %H:%M:%S"),
        millis.rem_euclid(1000)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known dev account (Alice), generic substrate prefix 42.
    const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
    const ALICE_PUBKEY: &str = "d43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d";

    #[test]
    fn test_base58_decode_rejects_invalid_chars() {
        assert!(base58_decode("0OIl").is_none());
        assert!(base58_decode("abc").is_some());
    }

    #[test]
    fn test_ss58_decode_known_account() {
        let payload = ss58_decode(ALICE, 42).unwrap();
        assert_eq!(payload.len(), 32);
        assert_eq!(hex::encode(&payload), ALICE_PUBKEY);
    }

    #[test]
    fn test_ss58_decode_wrong_prefix() {
        assert!(ss58_decode(ALICE, 0).is_none());
    }

    #[test]
    fn test_ss58_decode_corrupted_checksum() {
        let mut corrupted = ALICE.to_string();
        corrupted.pop();
        corrupted.push('3');
        assert!(ss58_decode(&corrupted, 42).is_none());
    }

    #[test]
    fn test_ss58_round_trip() {
        for prefix in [0u8, 2, 42] {
            let payload = ss58_decode(ALICE, 42).unwrap();
            let encoded = ss58_encode(&payload, prefix);
            assert_eq!(ss58_decode(&encoded, prefix).unwrap(), payload);
        }
    }

    #[test]
    fn test_ss58_round_trip_preserves_string() {
        let payload = ss58_decode(ALICE, 42).unwrap();
        assert_eq!(ss58_encode(&payload, 42), ALICE);
    }

    #[test]
    fn test_is_valid_address() {
        assert!(is_valid_address(ALICE));
        assert!(is_valid_address(
            "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty"
        ));
        assert!(!is_valid_address("0x0abc"));
        assert!(!is_valid_address("123456"));
        assert!(!is_valid_address("too-short"));
        // SS58 alphabet excludes 0, O, I and l.
        assert!(!is_valid_address(
            "0GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY"
        ));
    }

    #[test]
    fn test_extract_timestamp() {
        let blob = r#"[{"method":{"pallet":"timestamp","method":"set"},"args":{"now":"1600000000000"}}]"#;
        assert_eq!(
            extract_timestamp(blob).unwrap(),
            "2020-09-13 12:26:40.0000"
        );
    }

    #[test]
    fn test_extract_timestamp_unquoted() {
        let blob = r#"{"args":{"now":1600000000500}}"#;
        assert_eq!(
            extract_timestamp(blob).unwrap(),
            "2020-09-13 12:26:40.5000"
        );
    }

    #[test]
    fn test_extract_timestamp_missing() {
        assert!(extract_timestamp(r#"[{"method":"foo"}]"#).is_none());
    }
}
