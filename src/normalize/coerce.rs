//! L1: type coercion (§4.2). Coerces each field toward its declared or
//! inferred type; a coercion that cannot succeed falls back to the value's
//! string form rather than failing the record.

use std::collections::HashMap;

use serde_json::Value;

use super::field_type::{FALSY_TOKENS, FieldType, TRUTHY_TOKENS};
use crate::model::Record;

pub fn apply(record: &Record, declared_types: &HashMap<String, FieldType>) -> Record {
    let mut out = Record::new();
    for (field, value) in record {
        let field_type = declared_types
            .get(field)
            .copied()
            .unwrap_or_else(|| FieldType::infer(value));
        out.insert(field.clone(), coerce_value(value, field_type));
    }
    out
}

fn coerce_value(value: &Value, field_type: FieldType) -> Value {
    if value.is_null() {
        return Value::Null;
    }

    match field_type {
        FieldType::String => Value::String(coerce_string(value)),
        FieldType::Integer | FieldType::Float => coerce_numeric(value, field_type),
        FieldType::DateTime => coerce_datetime(value),
        FieldType::Binary => Value::String(coerce_binary(value)),
        FieldType::Boolean => coerce_boolean(value),
    }
}

fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.to_string()
        }
        other => crate::model::record::value_to_canonical_string(other),
    }
}

fn coerce_numeric(value: &Value, field_type: FieldType) -> Value {
    let raw = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => return other.clone(),
    };

    match field_type {
        FieldType::Integer => {
            if let Ok(i) = raw.parse::<i64>() {
                return Value::Number(i.into());
            }
            if let Ok(f) = raw.parse::<f64>() {
                if f.fract() == 0.0 {
                    return Value::Number((f as i64).into());
                }
            }
        }
        _ => {
            if let Ok(i) = raw.parse::<i64>() {
                return Value::Number(i.into());
            }
            if let Ok(f) = raw.parse::<f64>() {
                if let Some(n) = serde_json::Number::from_f64(f) {
                    return Value::Number(n);
                }
            }
        }
    }

    Value::String(raw)
}

fn coerce_datetime(value: &Value) -> Value {
    match value {
        Value::String(s) => match super::datetime::parse_to_iso(s) {
            Some(iso) => Value::String(iso),
            None => Value::String(s.clone()),
        },
        other => Value::String(crate::model::record::value_to_canonical_string(other)),
    }
}

fn coerce_binary(value: &Value) -> String {
    match value {
        Value::String(s) => hex::encode_str(s),
        other => hex::encode_str(&crate::model::record::value_to_canonical_string(other)),
    }
}

fn coerce_boolean(value: &Value) -> Value {
    match value {
        Value::Bool(b) => Value::Bool(*b),
        Value::Number(n) => Value::Bool(n.as_f64().map(|f| f != 0.0).unwrap_or(false)),
        Value::String(s) => {
            let upper = s.trim().to_uppercase();
            if TRUTHY_TOKENS.contains(&upper.as_str()) {
                Value::Bool(true)
            } else if FALSY_TOKENS.contains(&upper.as_str()) {
                Value::Bool(false)
            } else {
                Value::String(s.clone())
            }
        }
        other => other.clone(),
    }
}

/// Minimal hex encoding, local to the coercion layer — no external crate
/// pulls in plain byte-to-hex for a single string field.
mod hex {
    pub fn encode_str(s: &str) -> String {
        s.as_bytes().iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(pairs: &[(&str, Value)]) -> Record {
        let mut r = Record::new();
        for (k, v) in pairs {
            r.insert((*k).to_string(), v.clone());
        }
        r
    }

    #[test]
    fn coerces_declared_integer_field() {
        let r = record(&[("qty", json!("42"))]);
        let mut types = HashMap::new();
        types.insert("qty".to_string(), FieldType::Integer);
        let out = apply(&r, &types);
        assert_eq!(out.get("qty"), Some(&json!(42)));
    }

    #[test]
    fn boolean_tokens_map_correctly() {
        let r = record(&[("active", json!("Yes")), ("deleted", json!("no"))]);
        let mut types = HashMap::new();
        types.insert("active".to_string(), FieldType::Boolean);
        types.insert("deleted".to_string(), FieldType::Boolean);
        let out = apply(&r, &types);
        assert_eq!(out.get("active"), Some(&json!(true)));
        assert_eq!(out.get("deleted"), Some(&json!(false)));
    }

    #[test]
    fn unparsable_numeric_falls_back_to_string_form() {
        let r = record(&[("qty", json!("not-a-number"))]);
        let mut types = HashMap::new();
        types.insert("qty".to_string(), FieldType::Integer);
        let out = apply(&r, &types);
        assert_eq!(out.get("qty"), Some(&json!("not-a-number")));
    }

    #[test]
    fn infers_type_when_undeclared() {
        let r = record(&[("qty", json!(5)), ("name", json!("x"))]);
        let out = apply(&r, &HashMap::new());
        assert_eq!(out.get("qty"), Some(&json!(5)));
        assert_eq!(out.get("name"), Some(&json!("x")));
    }

    #[test]
    fn null_passes_through_untouched() {
        let r = record(&[("qty", Value::Null)]);
        let mut types = HashMap::new();
        types.insert("qty".to_string(), FieldType::Integer);
        let out = apply(&r, &types);
        assert_eq!(out.get("qty"), Some(&Value::Null));
    }
}
