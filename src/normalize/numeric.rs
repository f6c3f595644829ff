//! L3: numeric parse (§4.2). Strips thousands separators, currency symbols,
//! and accounting-style parentheses before parsing; unparsable values become
//! null rather than failing the record.

use serde_json::Value;
use std::collections::HashSet;

use crate::model::Record;

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£'];

pub fn apply(record: &Record, numeric_fields: &HashSet<String>) -> Record {
    let mut out = Record::new();
    for (field, value) in record {
        if numeric_fields.contains(field) {
            if let Value::String(s) = value {
                out.insert(field.clone(), parse(s));
                continue;
            }
        }
        out.insert(field.clone(), value.clone());
    }
    out
}

/// Parse a single numeric-like string, returning `Value::Null` on failure.
pub fn parse(input: &str) -> Value {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }

    let (body, negative) = if trimmed.starts_with('(') && trimmed.ends_with(')') {
        (&trimmed[1..trimmed.len() - 1], true)
    } else {
        (trimmed, false)
    };

    let cleaned: String = body
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c) && *c != ',')
        .collect();
    let cleaned = cleaned.trim();

    match cleaned.parse::<f64>() {
        Ok(mut n) => {
            if negative {
                n = -n.abs();
            }
            if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                Value::Number((n as i64).into())
            } else {
                serde_json::Number::from_f64(n)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        Err(_) => Value::Null,
    }
}

/// A string "looks numeric" once separators/symbols are stripped and the
/// remainder parses — used by the delta/normalize auto-detection paths.
pub fn looks_numeric(input: &str) -> bool {
    !matches!(parse(input), Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_thousands_separators() {
        assert_eq!(parse("1,234"), Value::Number(1234.into()));
    }

    #[test]
    fn strips_currency_symbols() {
        assert_eq!(parse("$1,234.50"), serde_json::json!(1234.50));
    }

    #[test]
    fn accounting_parens_become_negative() {
        assert_eq!(parse("(1,234.50)"), serde_json::json!(-1234.50));
    }

    #[test]
    fn accepts_scientific_notation() {
        assert_eq!(parse("1.5e3"), serde_json::json!(1500));
    }

    #[test]
    fn unparsable_becomes_null() {
        assert_eq!(parse("not a number"), Value::Null);
    }

    #[test]
    fn empty_becomes_null() {
        assert_eq!(parse("   "), Value::Null);
    }
}
