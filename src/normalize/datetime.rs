//! L4: datetime parse (§4.2). Tries a fixed ordered list of formats; on
//! total failure the original value passes through unchanged — this is a
//! hard requirement, not a fallback default.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::collections::HashSet;

use crate::model::Record;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

pub fn apply(record: &Record, datetime_fields: &HashSet<String>) -> Record {
    let mut out = Record::new();
    for (field, value) in record {
        if datetime_fields.contains(field) {
            if let Value::String(s) = value {
                let result = parse_to_iso(s)
                    .map(Value::String)
                    .unwrap_or_else(|| value.clone());
                out.insert(field.clone(), result);
                continue;
            }
        }
        out.insert(field.clone(), value.clone());
    }
    out
}

/// Try RFC3339 first, then the fixed format list, then a lenient parser.
pub fn parse_to_iso(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.to_rfc3339());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(ndt.and_utc().to_rfc3339());
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(nd) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(nd.and_hms_opt(0, 0, 0).unwrap().and_utc().to_rfc3339());
        }
    }

    lenient_parse(trimmed)
}

/// A last-resort, free-form parser for the handful of shapes the fixed
/// format list doesn't cover (e.g. `2026.01.05`).
fn lenient_parse(input: &str) -> Option<String> {
    let normalized = input.replace('.', "-").replace('_', " ");
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt.to_rfc3339());
    }
    if let Ok(nd) = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d") {
        return Some(nd.and_hms_opt(0, 0, 0).unwrap().and_utc().to_rfc3339());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iso8601() {
        assert!(parse_to_iso("2026-01-05T10:00:00Z").is_some());
    }

    #[test]
    fn parses_european_date() {
        let result = parse_to_iso("31/01/2026").unwrap();
        assert!(result.starts_with("2026-01-31"));
    }

    #[test]
    fn parses_us_datetime() {
        let result = parse_to_iso("01/31/2026 10:00:00").unwrap();
        assert!(result.starts_with("2026-01-31"));
    }

    #[test]
    fn unparsable_returns_none_and_caller_keeps_original() {
        assert_eq!(parse_to_iso("not-a-date"), None);
    }

    #[test]
    fn apply_leaves_unparsable_value_unchanged() {
        let mut r = Record::new();
        r.insert("ts".to_string(), Value::String("garbage".into()));
        let mut fields = HashSet::new();
        fields.insert("ts".to_string());
        let out = apply(&r, &fields);
        assert_eq!(out.get("ts"), Some(&Value::String("garbage".into())));
    }
}
