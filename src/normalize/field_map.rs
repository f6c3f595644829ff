//! L5: field map (§4.2). Renames fields, applies the configured
//! transformation, substitutes defaults for null, and records required-field
//! violations without aborting the record.

use serde_json::Value;

use crate::model::{FieldMapping, Record, Transformation};

/// A required field that was null (or absent) after mapping and had no
/// default to fall back on.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

pub fn apply(record: &Record, mappings: &[FieldMapping]) -> (Record, Vec<ValidationError>) {
    let mut out = Record::new();
    let mut errors = Vec::new();

    for mapping in mappings {
        let raw = record.get(&mapping.source_field).cloned().unwrap_or(Value::Null);
        let mut value = apply_transformation(mapping.transformation, raw);

        if value.is_null() {
            if let Some(default) = &mapping.default_value {
                value = default.clone();
            }
        }

        if mapping.is_required && value.is_null() {
            errors.push(ValidationError {
                field: mapping.target_field.clone(),
                message: format!("required field '{}' is null", mapping.target_field),
            });
        }

        out.insert(mapping.target_field.clone(), value);
    }

    (out, errors)
}

pub fn validate_row(record: &Record, mappings: &[FieldMapping]) -> Vec<ValidationError> {
    apply(record, mappings).1
}

pub fn apply_transformation(transformation: Transformation, value: Value) -> Value {
    let Value::String(s) = &value else {
        return value;
    };

    match transformation {
        Transformation::None => value,
        Transformation::Uppercase => Value::String(s.to_uppercase()),
        Transformation::Lowercase => Value::String(s.to_lowercase()),
        Transformation::Trim => Value::String(s.trim().to_string()),
        Transformation::TitleCase => Value::String(title_case(s)),
        Transformation::Capitalize => Value::String(capitalize(s)),
        Transformation::StripWhitespace => {
            Value::String(s.chars().filter(|c| !c.is_whitespace()).collect())
        }
        Transformation::RemoveSpecialChars => Value::String(
            s.chars()
                .filter(|c| c.is_alphanumeric() || c.is_whitespace())
                .collect(),
        ),
    }
}

fn title_case(s: &str) -> String {
    s.split(' ')
        .map(|word| capitalize(word))
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapping(source: &str, target: &str, t: Transformation, required: bool) -> FieldMapping {
        FieldMapping {
            entity_name: "inventory_items".to_string(),
            source_field: source.to_string(),
            target_field: target.to_string(),
            transformation: t,
            is_required: required,
            default_value: None,
        }
    }

    #[test]
    fn renames_and_transforms_field() {
        let mut r = Record::new();
        r.insert("name".to_string(), json!("contoso ltd"));
        let mappings = vec![mapping("name", "display_name", Transformation::TitleCase, false)];
        let (out, errors) = apply(&r, &mappings);
        assert_eq!(out.get("display_name"), Some(&json!("Contoso Ltd")));
        assert!(errors.is_empty());
    }

    #[test]
    fn default_applied_when_mapped_value_is_null() {
        let r = Record::new();
        let mut m = mapping("missing", "status", Transformation::None, false);
        m.default_value = Some(json!("unknown"));
        let (out, _) = apply(&r, &[m]);
        assert_eq!(out.get("status"), Some(&json!("unknown")));
    }

    #[test]
    fn required_null_field_reported_but_does_not_abort() {
        let r = Record::new();
        let mappings = vec![mapping("missing", "status", Transformation::None, true)];
        let (out, errors) = apply(&r, &mappings);
        assert!(out.contains_key("status"));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "status");
    }

    #[test]
    fn strip_whitespace_removes_all_whitespace() {
        let result = apply_transformation(Transformation::StripWhitespace, json!("a b\tc"));
        assert_eq!(result, json!("abc"));
    }

    #[test]
    fn remove_special_chars_keeps_alphanumerics_and_spaces() {
        let result = apply_transformation(Transformation::RemoveSpecialChars, json!("a-b_c! d"));
        assert_eq!(result, json!("abc d"));
    }

    #[test]
    fn capitalize_only_first_letter_of_whole_string() {
        let result = apply_transformation(Transformation::Capitalize, json!("hello world"));
        assert_eq!(result, json!("Hello world"));
    }
}
