use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single source-field → target-field transformation, applied by
/// normalizer layer 5 (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    pub uid: String,
    pub entity_name: String,
    pub source_field: String,
    pub target_field: String,
    pub transformation: Transformation,
    pub is_required: bool,
    pub default_value: Option<Value>,
}

/// The closed set of field-map transformations (§3, §4.2) — modeled as an
/// enum plus a lookup function rather than runtime reflection, per the
/// declarative-normalization redesign note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transformation {
    None,
    Uppercase,
    Lowercase,
    Trim,
    TitleCase,
    Capitalize,
    StripWhitespace,
    RemoveSpecialChars,
}

impl Transformation {
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Uppercase => "uppercase",
            Self::Lowercase => "lowercase",
            Self::Trim => "trim",
            Self::TitleCase => "title_case",
            Self::Capitalize => "capitalize",
            Self::StripWhitespace => "strip_whitespace",
            Self::RemoveSpecialChars => "remove_special_chars",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Some(match label {
            "none" => Self::None,
            "uppercase" => Self::Uppercase,
            "lowercase" => Self::Lowercase,
            "trim" => Self::Trim,
            "title_case" => Self::TitleCase,
            "capitalize" => Self::Capitalize,
            "strip_whitespace" => Self::StripWhitespace,
            "remove_special_chars" => Self::RemoveSpecialChars,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_roundtrips_through_from_label() {
        for t in [
            Transformation::None,
            Transformation::Uppercase,
            Transformation::Lowercase,
            Transformation::Trim,
            Transformation::TitleCase,
            Transformation::Capitalize,
            Transformation::StripWhitespace,
            Transformation::RemoveSpecialChars,
        ] {
            assert_eq!(Transformation::from_label(t.label()), Some(t));
        }
    }
}
