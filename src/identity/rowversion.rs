//! Row-version extraction and comparison (§4.1): an opaque, monotonic
//! per-record marker used to detect changes without reading full contents.

use chrono::DateTime;
use serde_json::Value;
use std::cmp::Ordering;

/// Extract a row-version's canonical string form from a raw field value.
pub fn extract(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Compare two row-version strings. Precedence: parse-as-datetime (only
/// attempted when the value looks date-like) -> parse-as-number ->
/// lexicographic string compare.
pub fn compare(a: &str, b: &str) -> Ordering {
    if looks_datetime(a) && looks_datetime(b) {
        if let (Ok(da), Ok(db)) = (parse_datetime(a), parse_datetime(b)) {
            return da.cmp(&db);
        }
    }

    if let (Ok(na), Ok(nb)) = (a.parse::<f64>(), b.parse::<f64>()) {
        return na.partial_cmp(&nb).unwrap_or(Ordering::Equal);
    }

    a.cmp(b)
}

pub fn is_newer(incoming: &str, stored: &str) -> bool {
    compare(incoming, stored) == Ordering::Greater
}

pub fn is_equal(a: &str, b: &str) -> bool {
    compare(a, b) == Ordering::Equal
}

fn looks_datetime(value: &str) -> bool {
    value.contains('T') || value.contains(' ')
}

fn parse_datetime(value: &str) -> Result<DateTime<chrono::FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).or_else(|_| {
        chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
            .map(|ndt| ndt.and_utc().fixed_offset())
    })
}

/// A well-formed row-version is simply a non-empty string; this mirrors the
/// source's own permissive validation (it accepts any comparable marker).
pub fn validate(value: &str) -> bool {
    !value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compares_numeric_rowversions() {
        assert_eq!(compare("5", "10"), Ordering::Less);
        assert_eq!(compare("10", "5"), Ordering::Greater);
        assert_eq!(compare("5", "5"), Ordering::Equal);
    }

    #[test]
    fn compares_datetime_rowversions() {
        assert!(is_newer("2026-02-01T00:00:00Z", "2026-01-01T00:00:00Z"));
        assert!(!is_newer("2026-01-01T00:00:00Z", "2026-02-01T00:00:00Z"));
    }

    #[test]
    fn falls_back_to_lexicographic_compare() {
        assert_eq!(compare("abc", "abd"), Ordering::Less);
    }

    #[test]
    fn equal_values_detected() {
        assert!(is_equal("7", "7"));
        assert!(is_equal("2026-01-01T00:00:00Z", "2026-01-01T00:00:00Z"));
    }

    #[test]
    fn extract_trims_strings_and_drops_empty() {
        assert_eq!(extract(&Value::String("  42  ".into())), Some("42".into()));
        assert_eq!(extract(&Value::String("   ".into())), None);
        assert_eq!(extract(&Value::Null), None);
    }
}
