// Copyright (C) 2026 Parity Technologies (UK) Ltd.
// SPDX-License-Identifier: GPL-3.0-or-later

//! SCALE decoding of extrinsics, events and digest logs against runtime
//! metadata, producing the same JSON shapes the HTTP sidecar serves so both
//! reader variants feed the store identically.

use heck::ToLowerCamelCase;
use parity_scale_codec::{Compact, Decode};
use scale_info::PortableRegistry;
use serde_json::{Map, Value as JsonValue, json};
use sp_core::crypto::{AccountId32, Ss58AddressFormat, Ss58Codec};
use sp_runtime::DigestItem;
use sp_runtime::generic::Era;

use frame_metadata::{RuntimeMetadata, RuntimeMetadataPrefixed, v14, v15};
use scale_value::{Composite, Primitive, Value as ScaleValue, ValueDef};

/// Prefix rendered into SS58 strings. The indexer stores generic-substrate
/// addresses; chain-specific rendering is a query-time concern.
const SS58_FORMAT: u16 = 42;

/// The only extrinsic format version we decode.
const EXTRINSIC_VERSION: u8 = 4;

/// Runtime metadata reduced to the type ids the decoder needs, memoized per
/// spec version by the RPC reader.
pub(super) struct DecodedMetadata {
    types: PortableRegistry,
    address_ty: u32,
    call_ty: u32,
    signature_ty: u32,
    signed_extensions: Vec<(String, u32)>,
    events_ty: u32,
}

impl DecodedMetadata {
    pub(super) fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        let prefixed = RuntimeMetadataPrefixed::decode(&mut &bytes[..])
            .map_err(|e| format!("metadata envelope: {e}"))?;
        if prefixed.0 != frame_metadata::META_RESERVED {
            return Err("metadata is missing the reserved magic prefix".to_string());
        }
        match prefixed.1 {
            RuntimeMetadata::V14(meta) => Self::from_v14(meta),
            RuntimeMetadata::V15(meta) => Self::from_v15(meta),
            _ => Err("unsupported metadata version, need V14 or V15".to_string()),
        }
    }

    fn from_v14(meta: v14::RuntimeMetadataV14) -> Result<Self, String> {
        let ext_ty = meta
            .types
            .resolve(meta.extrinsic.ty.id)
            .ok_or("extrinsic type missing from the registry")?;
        let param = |name: &str| {
            ext_ty
                .type_params
                .iter()
                .find(|p| p.name == name)
                .and_then(|p| p.ty)
                .map(|ty| ty.id)
        };
        let address_ty = param("Address").ok_or("extrinsic Address type parameter missing")?;
        let call_ty = param("Call").ok_or("extrinsic Call type parameter missing")?;
        let signature_ty = param("Signature").ok_or("extrinsic Signature type parameter missing")?;

        Ok(Self {
            address_ty,
            call_ty,
            signature_ty,
            signed_extensions: meta
                .extrinsic
                .signed_extensions
                .iter()
                .map(|se| (se.identifier.clone(), se.ty.id))
                .collect(),
            events_ty: events_storage_ty(&meta.pallets)?,
            types: meta.types,
        })
    }

    fn from_v15(meta: v15::RuntimeMetadataV15) -> Result<Self, String> {
        Ok(Self {
            address_ty: meta.extrinsic.address_ty.id,
            call_ty: meta.extrinsic.call_ty.id,
            signature_ty: meta.extrinsic.signature_ty.id,
            signed_extensions: meta
                .extrinsic
                .signed_extensions
                .iter()
                .map(|se| (se.identifier.clone(), se.ty.id))
                .collect(),
            events_ty: events_storage_ty(&meta.pallets)?,
            types: meta.types,
        })
    }
}

fn events_storage_ty<S>(pallets: &[S]) -> Result<u32, String>
where
    S: PalletWithStorage,
{
    pallets
        .iter()
        .find(|p| p.pallet_name() == "System")
        .and_then(|p| p.events_entry_ty())
        .ok_or_else(|| "System.Events storage entry not found".to_string())
}

/// The V14 and V15 pallet metadata types are distinct; this is the sliver of
/// shape the decoder needs from either.
trait PalletWithStorage {
    fn pallet_name(&self) -> &str;
    fn events_entry_ty(&self) -> Option<u32>;
}

impl PalletWithStorage for v14::PalletMetadata<scale_info::form::PortableForm> {
    fn pallet_name(&self) -> &str {
        &self.name
    }

    fn events_entry_ty(&self) -> Option<u32> {
        self.storage.as_ref().and_then(|storage| {
            storage.entries.iter().find_map(|entry| {
                if entry.name != "Events" {
                    return None;
                }
                match &entry.ty {
                    v14::StorageEntryType::Plain(ty) => Some(ty.id),
                    _ => None,
                }
            })
        })
    }
}

impl PalletWithStorage for v15::PalletMetadata<scale_info::form::PortableForm> {
    fn pallet_name(&self) -> &str {
        &self.name
    }

    fn events_entry_ty(&self) -> Option<u32> {
        self.storage.as_ref().and_then(|storage| {
            storage.entries.iter().find_map(|entry| {
                if entry.name != "Events" {
                    return None;
                }
                match &entry.ty {
                    v15::StorageEntryType::Plain(ty) => Some(ty.id),
                    _ => None,
                }
            })
        })
    }
}

/// Storage key of `System.Events`: `twox128("System") ++ twox128("Events")`.
pub(super) fn system_events_key() -> String {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(&sp_crypto_hashing::twox_128(b"System"));
    key.extend_from_slice(&sp_crypto_hashing::twox_128(b"Events"));
    format!("0x{}", hex::encode(key))
}

// ================================================================================================
// Extrinsics
// ================================================================================================

/// Decode every extrinsic of a block into the sidecar JSON shape.
pub(super) fn decode_extrinsics(
    hexes: &[String],
    meta: &DecodedMetadata,
) -> Result<JsonValue, String> {
    let decoded = hexes
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            decode_extrinsic(&hex_bytes(raw)?, meta)
                .map_err(|e| format!("extrinsic {index}: {e}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(JsonValue::Array(decoded))
}

fn hex_bytes(raw: &str) -> Result<Vec<u8>, String> {
    hex::decode(raw.trim_start_matches("0x")).map_err(|e| format!("invalid hex: {e}"))
}

fn decode_extrinsic(bytes: &[u8], meta: &DecodedMetadata) -> Result<JsonValue, String> {
    let mut cursor = bytes;
    let _declared_len =
        Compact::<u64>::decode(&mut cursor).map_err(|e| format!("length prefix: {e}"))?;

    let (&version, rest) = cursor.split_first().ok_or("missing version byte")?;
    cursor = rest;

    let signed = version & 0b1000_0000 != 0;
    if version & 0b0111_1111 != EXTRINSIC_VERSION {
        return Err(format!(
            "unsupported extrinsic version {}",
            version & 0b0111_1111
        ));
    }

    let mut extrinsic = Map::new();

    if signed {
        let address = decode_value(&mut cursor, meta.address_ty, &meta.types)
            .map_err(|e| format!("address: {e}"))?;
        let signature = decode_value(&mut cursor, meta.signature_ty, &meta.types)
            .map_err(|e| format!("signature: {e}"))?;

        let mut signature_json = Map::new();
        signature_json.insert("signer".to_string(), address);
        signature_json.insert("signature".to_string(), signature);

        for (identifier, ty) in &meta.signed_extensions {
            let before = cursor;
            let value = decode_value(&mut cursor, *ty, &meta.types)
                .map_err(|e| format!("signed extension {identifier}: {e}"))?;
            let consumed = &before[..before.len() - cursor.len()];

            match identifier.as_str() {
                "CheckMortality" | "CheckEra" => {
                    extrinsic.insert("era".to_string(), era_to_json(consumed)?);
                }
                "CheckNonce" => {
                    signature_json.insert("nonce".to_string(), value);
                }
                "ChargeTransactionPayment" => {
                    signature_json.insert("tip".to_string(), value);
                }
                _ => {}
            }
        }

        extrinsic.insert("signature".to_string(), JsonValue::Object(signature_json));
    } else {
        extrinsic.insert("signature".to_string(), JsonValue::Null);
    }

    let call = scale_value::scale::decode_as_type(&mut cursor, meta.call_ty, &meta.types)
        .map_err(|e| format!("call: {e}"))?;
    let (pallet, method, args) = split_call(&call, &meta.types)?;

    extrinsic.insert(
        "method".to_string(),
        json!({ "pallet": pallet, "method": method }),
    );
    extrinsic.insert("args".to_string(), args);
    extrinsic.insert("events".to_string(), JsonValue::Array(Vec::new()));

    Ok(JsonValue::Object(extrinsic))
}

fn decode_value(
    cursor: &mut &[u8],
    ty: u32,
    types: &PortableRegistry,
) -> Result<JsonValue, String> {
    let value =
        scale_value::scale::decode_as_type(cursor, ty, types).map_err(|e| e.to_string())?;
    Ok(value_to_json(&value, types))
}

/// The era is re-decoded from its raw bytes so mortal eras yield their
/// `[period, phase]` pair instead of an opaque variant index.
fn era_to_json(bytes: &[u8]) -> Result<JsonValue, String> {
    let era = Era::decode(&mut &bytes[..]).map_err(|e| format!("era: {e}"))?;
    Ok(match era {
        Era::Immortal => json!({ "immortalArea": "0x00" }),
        Era::Mortal(period, phase) => {
            json!({ "mortalArea": [period.to_string(), phase.to_string()] })
        }
    })
}

/// Split the outer call value into `(pallet, method, args)`.
fn split_call(
    call: &ScaleValue<u32>,
    types: &PortableRegistry,
) -> Result<(String, String, JsonValue), String> {
    let ValueDef::Variant(outer) = &call.value else {
        return Err("call is not a variant".to_string());
    };
    let inner = match &outer.values {
        Composite::Unnamed(values) if values.len() == 1 => &values[0],
        _ => return Err(format!("malformed call variant {}", outer.name)),
    };
    let ValueDef::Variant(call_variant) = &inner.value else {
        return Err(format!("pallet {} call is not a variant", outer.name));
    };

    let args = match &call_variant.values {
        Composite::Named(fields) => {
            let mut map = Map::new();
            for (name, value) in fields {
                map.insert(name.clone(), value_to_json(value, types));
            }
            JsonValue::Object(map)
        }
        Composite::Unnamed(values) => JsonValue::Array(
            values
                .iter()
                .map(|value| value_to_json(value, types))
                .collect(),
        ),
    };

    Ok((
        outer.name.to_lower_camel_case(),
        call_variant.name.to_lower_camel_case(),
        args,
    ))
}

// ================================================================================================
// Events
// ================================================================================================

/// Which execution phase emitted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Phase {
    Initialization,
    ApplyExtrinsic(u32),
    Finalization,
}

#[derive(Debug, Clone)]
pub(super) struct DecodedEvent {
    pub pallet: String,
    pub method: String,
    pub phase: Phase,
    pub data: Vec<JsonValue>,
}

impl DecodedEvent {
    fn to_json(&self) -> JsonValue {
        json!({
            "method": { "pallet": self.pallet, "method": self.method },
            "data": self.data,
        })
    }
}

/// Decode the raw `System.Events` storage value.
pub(super) fn decode_events(
    bytes: &[u8],
    meta: &DecodedMetadata,
) -> Result<Vec<DecodedEvent>, String> {
    let mut cursor = bytes;
    let value = scale_value::scale::decode_as_type(&mut cursor, meta.events_ty, &meta.types)
        .map_err(|e| format!("events: {e}"))?;

    let ValueDef::Composite(Composite::Unnamed(records)) = &value.value else {
        return Err("events storage value is not a sequence".to_string());
    };

    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            parse_event_record(record, &meta.types).ok_or_else(|| format!("event record {index} is malformed"))
        })
        .collect()
}

fn parse_event_record(record: &ScaleValue<u32>, types: &PortableRegistry) -> Option<DecodedEvent> {
    let ValueDef::Composite(Composite::Named(fields)) = &record.value else {
        return None;
    };
    let field = |name: &str| fields.iter().find(|(n, _)| n == name).map(|(_, v)| v);

    let phase = parse_phase(field("phase")?)?;

    let event = field("event")?;
    let ValueDef::Variant(pallet_variant) = &event.value else {
        return None;
    };
    let inner = match &pallet_variant.values {
        Composite::Unnamed(values) if values.len() == 1 => &values[0],
        _ => return None,
    };
    let ValueDef::Variant(event_variant) = &inner.value else {
        return None;
    };

    let data = match &event_variant.values {
        Composite::Named(fields) => fields
            .iter()
            .map(|(_, value)| value_to_json(value, types))
            .collect(),
        Composite::Unnamed(values) => values
            .iter()
            .map(|value| value_to_json(value, types))
            .collect(),
    };

    Some(DecodedEvent {
        pallet: pallet_variant.name.to_lower_camel_case(),
        method: event_variant.name.clone(),
        phase,
        data,
    })
}

fn parse_phase(phase: &ScaleValue<u32>) -> Option<Phase> {
    let ValueDef::Variant(variant) = &phase.value else {
        return None;
    };
    match variant.name.as_str() {
        "Initialization" => Some(Phase::Initialization),
        "Finalization" => Some(Phase::Finalization),
        "ApplyExtrinsic" => {
            let Composite::Unnamed(values) = &variant.values else {
                return None;
            };
            let ValueDef::Primitive(Primitive::U128(index)) = &values.first()?.value else {
                return None;
            };
            Some(Phase::ApplyExtrinsic(*index as u32))
        }
        _ => None,
    }
}

/// Merge decoded events into the extrinsics they belong to, keyed by the
/// extrinsic's call module. Events whose pallet matches no extrinsic land in
/// the `on_initialize`/`on_finalize` buckets according to their phase.
///
/// Returns `(on_initialize, on_finalize)`.
pub(super) fn merge_events(
    extrinsics: &mut JsonValue,
    events: Vec<DecodedEvent>,
) -> (JsonValue, JsonValue) {
    let mut on_initialize = Vec::new();
    let mut on_finalize = Vec::new();
    let mut fallback = Vec::new();

    let items = extrinsics.as_array_mut().unwrap_or(&mut fallback);

    'events: for event in events {
        for extrinsic in items.iter_mut() {
            let pallet = extrinsic
                .pointer("/method/pallet")
                .and_then(JsonValue::as_str)
                .unwrap_or("");
            if pallet.eq_ignore_ascii_case(&event.pallet) {
                if let Some(JsonValue::Array(list)) = extrinsic.get_mut("events") {
                    list.push(event.to_json());
                    continue 'events;
                }
            }
        }
        match event.phase {
            Phase::Initialization => on_initialize.push(event.to_json()),
            _ => on_finalize.push(event.to_json()),
        }
    }

    (
        json!({ "events": on_initialize }),
        json!({ "events": on_finalize }),
    )
}

// ================================================================================================
// Digest logs
// ================================================================================================

/// Convert the header's digest log items into the sidecar log shape.
pub(super) fn decode_digest_logs(hex_logs: &[String]) -> JsonValue {
    let logs: Vec<JsonValue> = hex_logs
        .iter()
        .filter_map(|raw| {
            let bytes = hex_bytes(raw).ok()?;
            DigestItem::decode(&mut &bytes[..]).ok()
        })
        .map(|item| match item {
            DigestItem::PreRuntime(engine_id, data) => json!({
                "type": "PreRuntime",
                "index": "6",
                "value": [hex_with_prefix(&engine_id), hex_with_prefix(&data)],
            }),
            DigestItem::Consensus(engine_id, data) => json!({
                "type": "Consensus",
                "index": "4",
                "value": [hex_with_prefix(&engine_id), hex_with_prefix(&data)],
            }),
            DigestItem::Seal(engine_id, data) => json!({
                "type": "Seal",
                "index": "5",
                "value": [hex_with_prefix(&engine_id), hex_with_prefix(&data)],
            }),
            DigestItem::RuntimeEnvironmentUpdated => json!({
                "type": "RuntimeEnvironmentUpdated",
                "index": "8",
                "value": JsonValue::Null,
            }),
            DigestItem::Other(data) => json!({
                "type": "Other",
                "index": "0",
                "value": hex_with_prefix(&data),
            }),
        })
        .collect();
    JsonValue::Array(logs)
}

fn hex_with_prefix(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

// ================================================================================================
// SCALE value → JSON
// ================================================================================================

/// Convert a decoded SCALE value into sidecar-style JSON: numerics are
/// stringified, byte arrays render as hex, and `AccountId32` values render as
/// SS58 addresses so the address extractor sees them.
fn value_to_json(value: &ScaleValue<u32>, types: &PortableRegistry) -> JsonValue {
    if type_name(value.context, types) == Some("AccountId32") {
        if let Some(bytes) = collect_bytes(value) {
            if bytes.len() == 32 {
                let mut raw = [0u8; 32];
                raw.copy_from_slice(&bytes);
                let address = AccountId32::new(raw)
                    .to_ss58check_with_version(Ss58AddressFormat::custom(SS58_FORMAT));
                return JsonValue::String(address);
            }
        }
    }

    match &value.value {
        ValueDef::Composite(Composite::Named(fields)) => {
            let mut map = Map::new();
            for (name, field) in fields {
                map.insert(name.clone(), value_to_json(field, types));
            }
            JsonValue::Object(map)
        }
        ValueDef::Composite(Composite::Unnamed(items)) => {
            if items.is_empty() {
                return JsonValue::Null;
            }
            if items.len() == 1 {
                return value_to_json(&items[0], types);
            }
            if let Some(bytes) = collect_primitive_bytes(items) {
                return JsonValue::String(hex_with_prefix(&bytes));
            }
            JsonValue::Array(items.iter().map(|item| value_to_json(item, types)).collect())
        }
        ValueDef::Variant(variant) => {
            if variant.values.is_empty() {
                return JsonValue::String(variant.name.to_lower_camel_case());
            }
            let inner = match &variant.values {
                Composite::Unnamed(values) if values.len() == 1 => {
                    value_to_json(&values[0], types)
                }
                Composite::Unnamed(values) => JsonValue::Array(
                    values.iter().map(|item| value_to_json(item, types)).collect(),
                ),
                Composite::Named(fields) => {
                    let mut map = Map::new();
                    for (name, field) in fields {
                        map.insert(name.clone(), value_to_json(field, types));
                    }
                    JsonValue::Object(map)
                }
            };
            let mut map = Map::new();
            map.insert(variant.name.to_lower_camel_case(), inner);
            JsonValue::Object(map)
        }
        ValueDef::Primitive(primitive) => match primitive {
            Primitive::Bool(b) => JsonValue::Bool(*b),
            Primitive::Char(c) => JsonValue::String(c.to_string()),
            Primitive::String(s) => JsonValue::String(s.clone()),
            Primitive::U128(n) => JsonValue::String(n.to_string()),
            Primitive::I128(n) => JsonValue::String(n.to_string()),
            Primitive::U256(bytes) | Primitive::I256(bytes) => {
                JsonValue::String(hex_with_prefix(bytes))
            }
        },
        ValueDef::BitSequence(_) => {
            serde_json::to_value(value).unwrap_or(JsonValue::Null)
        }
    }
}

fn type_name(ty: u32, types: &PortableRegistry) -> Option<&str> {
    types
        .resolve(ty)
        .and_then(|ty| ty.path.segments.last())
        .map(String::as_str)
}

/// Flatten nested composites of byte-sized primitives into a byte vector.
fn collect_bytes(value: &ScaleValue<u32>) -> Option<Vec<u8>> {
    match &value.value {
        ValueDef::Primitive(Primitive::U128(n)) if *n <= u8::MAX as u128 => Some(vec![*n as u8]),
        ValueDef::Composite(composite) => {
            let mut bytes = Vec::new();
            for item in composite.values() {
                bytes.extend(collect_bytes(item)?);
            }
            Some(bytes)
        }
        _ => None,
    }
}

/// A flat unnamed composite whose members are all byte-sized primitives.
fn collect_primitive_bytes(items: &[ScaleValue<u32>]) -> Option<Vec<u8>> {
    items
        .iter()
        .map(|item| match &item.value {
            ValueDef::Primitive(Primitive::U128(n)) if *n <= u8::MAX as u128 => Some(*n as u8),
            _ => None,
        })
        .collect()
}

// ================================================================================================
// `_raw` suffix stripping
// ================================================================================================

/// Remove every object key with a `_raw` suffix, recursively. The sidecar
/// emits these shadow fields beside the decoded values; the store keeps only
/// the decoded form.
pub(super) fn strip_raw_fields(value: &mut JsonValue) {
    match value {
        JsonValue::Object(map) => {
            map.retain(|key, _| !key.ends_with("_raw"));
            for child in map.values_mut() {
                strip_raw_fields(child);
            }
        }
        JsonValue::Array(items) => {
            for item in items {
                strip_raw_fields(item);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_events_key() {
        assert_eq!(
            system_events_key(),
            "0x26aa394eea5630e07c48ae0c9558cef780d41e5e16056765bc8461851072c9d7"
        );
    }

    #[test]
    fn test_strip_raw_fields() {
        let mut value = json!({
            "method": { "pallet": "balances" },
            "args_raw": "0xdead",
            "args": { "value": "10", "value_raw": "0x0a" },
            "events": [ { "data_raw": "0x", "data": [] } ]
        });
        strip_raw_fields(&mut value);
        assert_eq!(
            value,
            json!({
                "method": { "pallet": "balances" },
                "args": { "value": "10" },
                "events": [ { "data": [] } ]
            })
        );
    }

    #[test]
    fn test_era_to_json_immortal() {
        // Immortal era encodes as a single zero byte.
        assert_eq!(era_to_json(&[0u8]).unwrap(), json!({ "immortalArea": "0x00" }));
    }

    #[test]
    fn test_era_to_json_mortal() {
        let era = Era::Mortal(64, 12);
        let bytes = parity_scale_codec::Encode::encode(&era);
        assert_eq!(
            era_to_json(&bytes).unwrap(),
            json!({ "mortalArea": ["64", "12"] })
        );
    }

    #[test]
    fn test_merge_events_by_call_module() {
        let mut extrinsics = json!([
            { "method": { "pallet": "balances", "method": "transfer" }, "events": [] },
            { "method": { "pallet": "timestamp", "method": "set" }, "events": [] }
        ]);
        let events = vec![
            DecodedEvent {
                pallet: "balances".to_string(),
                method: "Transfer".to_string(),
                phase: Phase::ApplyExtrinsic(0),
                data: vec![json!("100")],
            },
            DecodedEvent {
                pallet: "session".to_string(),
                method: "NewSession".to_string(),
                phase: Phase::Initialization,
                data: vec![],
            },
            DecodedEvent {
                pallet: "system".to_string(),
                method: "ExtrinsicSuccess".to_string(),
                phase: Phase::ApplyExtrinsic(1),
                data: vec![],
            },
        ];

        let (on_initialize, on_finalize) = merge_events(&mut extrinsics, events);

        let balances_events = extrinsics[0]["events"].as_array().unwrap();
        assert_eq!(balances_events.len(), 1);
        assert_eq!(balances_events[0]["method"]["method"], "Transfer");

        assert_eq!(on_initialize["events"].as_array().unwrap().len(), 1);
        // The system event matched no extrinsic and was applied, not initialization.
        assert_eq!(on_finalize["events"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_phase_parsing() {
        let apply = ScaleValue::variant(
            "ApplyExtrinsic",
            Composite::Unnamed(vec![ScaleValue::u128(3)]),
        )
        .map_context(|_| 0u32);
        assert_eq!(parse_phase(&apply), Some(Phase::ApplyExtrinsic(3)));

        let fin = ScaleValue::variant("Finalization", Composite::Unnamed(vec![]))
            .map_context(|_| 0u32);
        assert_eq!(parse_phase(&fin), Some(Phase::Finalization));
    }
}
