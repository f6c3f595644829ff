//! The in-flight `Record` type: an unordered field-name → value mapping,
//! plus the reserved identity/parent-ref field names the pipeline stamps
//! onto it as it passes through stages.

use serde_json::Value;

/// A record in flight through the pipeline. Backed by `serde_json::Map` so
/// that scalar values (string, integer, real, boolean, null) and the
/// occasional composite value (for fields the normalizer leaves as JSON)
/// share one representation with the wire format used to talk to the
/// source/sink APIs.
pub type Record = serde_json::Map<String, Value>;

pub const FIELD_BK_HASH: &str = "erp_key_hash";
pub const FIELD_DATA_HASH: &str = "erp_data_hash";
pub const FIELD_ROWVERSION: &str = "erp_rowversion";
pub const FIELD_REF_STR: &str = "erp_ref_str";
pub const FIELD_PARENT_REFS: &str = "parent_refs";

/// Fields excluded from the data hash (§4.1): bookkeeping columns that do
/// not represent the entity's data content.
pub const DATA_HASH_EXCLUDED_FIELDS: &[&str] = &[
    "created_at",
    "updated_at",
    "uid",
    "id",
    FIELD_BK_HASH,
    FIELD_DATA_HASH,
    FIELD_ROWVERSION,
];

pub fn bk_hash(record: &Record) -> Option<&str> {
    record.get(FIELD_BK_HASH).and_then(Value::as_str)
}

pub fn data_hash(record: &Record) -> Option<&str> {
    record.get(FIELD_DATA_HASH).and_then(Value::as_str)
}

pub fn rowversion(record: &Record) -> Option<&Value> {
    record.get(FIELD_ROWVERSION).filter(|v| !v.is_null())
}

/// Render a JSON scalar to its canonical string form, used both for the BK
/// input and, in non-hashing contexts, for human-readable reference strings.
pub fn value_to_canonical_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(f) = n.as_f64() {
                format_float(f)
            } else {
                n.to_string()
            }
        }
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Render a float with up to 6 fractional digits, trailing zeros (and a
/// then-trailing decimal point) stripped — shared by the data hash and the
/// numeric normalization layer.
pub fn format_float(f: f64) -> String {
    let formatted = format!("{f:.6}");
    let trimmed = formatted.trim_end_matches('0');
    let trimmed = trimmed.trim_end_matches('.');
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn format_float_strips_trailing_zeros() {
        assert_eq!(format_float(1.5), "1.5");
        assert_eq!(format_float(1.0), "1");
        assert_eq!(format_float(1.230000), "1.23");
    }

    #[test]
    fn canonical_string_trims_strings() {
        assert_eq!(value_to_canonical_string(&json!("  hi  ")), "hi");
    }

    #[test]
    fn canonical_string_renders_integers_without_decimal() {
        assert_eq!(value_to_canonical_string(&json!(42)), "42");
    }

    #[test]
    fn canonical_string_renders_booleans() {
        assert_eq!(value_to_canonical_string(&json!(true)), "true");
        assert_eq!(value_to_canonical_string(&json!(false)), "false");
    }
}
