//! Declared or inferred field types, consumed by the type-coercion layer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Float,
    DateTime,
    Binary,
    Boolean,
}

impl FieldType {
    /// Infer a type from the runtime shape of a JSON value when no declared
    /// type is available (§4.2 L1).
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Bool(_) => FieldType::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => FieldType::Integer,
            Value::Number(_) => FieldType::Float,
            _ => FieldType::String,
        }
    }
}

pub const TRUTHY_TOKENS: &[&str] = &["Y", "TRUE", "T", "YES", "1"];
pub const FALSY_TOKENS: &[&str] = &["N", "FALSE", "F", "NO", "0"];
