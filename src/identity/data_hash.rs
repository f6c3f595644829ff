//! Data hash (DH): a deterministic 256-bit fingerprint of a record's
//! data-content fields, used by the hash-based delta strategy (§4.1, §4.3).

use crate::model::Record;
use crate::model::record::{DATA_HASH_EXCLUDED_FIELDS, value_to_canonical_string};
use serde_json::Value;

/// Compute the DH for `record`, excluding `extra_excluded` in addition to
/// the standard bookkeeping fields.
pub fn generate(record: &Record, extra_excluded: &[&str]) -> String {
    let mut fields: Vec<&String> = record
        .keys()
        .filter(|k| {
            !DATA_HASH_EXCLUDED_FIELDS.contains(&k.as_str())
                && !extra_excluded.contains(&k.as_str())
        })
        .collect();
    fields.sort();

    let mut parts = Vec::with_capacity(fields.len());
    for field in fields {
        let value = &record[field];
        if value.is_null() {
            continue;
        }
        let rendered = normalize_value(value);
        parts.push(format!("{field}={rendered}"));
    }

    let canonical = parts.join("|");
    blake3::hash(canonical.as_bytes()).to_hex().to_string()
}

fn normalize_value(value: &Value) -> String {
    match value {
        Value::Array(_) | Value::Object(_) => canonical_json(value),
        _ => value_to_canonical_string(value),
    }
}

/// Render composite values as compact JSON with sorted object keys, so
/// semantically-equal objects hash identically regardless of key order.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let parts: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", serde_json::to_string(k).unwrap(), canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", parts.join(","))
        }
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", parts.join(","))
        }
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

pub fn compare(dh1: &str, dh2: &str) -> bool {
    dh1 == dh2
}

pub fn has_changed(record: &Record, stored_dh: &str, extra_excluded: &[&str]) -> bool {
    generate(record, extra_excluded) != stored_dh
}

/// Validate that a DH is a well-formed 64-character lowercase hex string.
pub fn validate(dh: &str) -> bool {
    dh.len() == 64 && dh.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
}
