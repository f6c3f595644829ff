use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which pipeline stage produced the failure — used both for display and to
/// decide where a retry should resume from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailedStage {
    Normalize,
    Validate,
    Identity,
    Resolve,
    Ingest,
}

impl FailedStage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Normalize => "normalize",
            Self::Validate => "validate",
            Self::Identity => "identity",
            Self::Resolve => "resolve",
            Self::Ingest => "ingest",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Some(match label {
            "normalize" => Self::Normalize,
            "validate" => Self::Validate,
            "identity" => Self::Identity,
            "resolve" => Self::Resolve,
            "ingest" => Self::Ingest,
            _ => return None,
        })
    }
}

/// The dead-letter queue row: a record that could not be carried through to
/// completion, kept for inspection and bounded retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedRecord {
    pub uid: String,
    pub batch_uid: String,
    pub entity_name: String,
    pub raw_data: Value,
    pub normalized_data: Option<Value>,
    pub mapped_data: Option<Value>,
    pub stage_failed: FailedStage,
    pub error_type: String,
    pub error_message: String,
    pub retry_count: i64,
    pub max_retries: i64,
    pub next_retry_at: Option<String>,
    pub resolved_at: Option<String>,
    pub created_at: String,
}

impl FailedRecord {
    pub const DEFAULT_MAX_RETRIES: i64 = 3;

    /// A record is retryable iff it hasn't exhausted its retry budget and
    /// hasn't already been resolved.
    pub fn is_retryable(&self) -> bool {
        self.retry_count < self.max_retries && self.resolved_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FailedRecord {
        FailedRecord {
            uid: "u1".into(),
            batch_uid: "b1".into(),
            entity_name: "inventory_items".into(),
            raw_data: Value::Null,
            normalized_data: None,
            mapped_data: None,
            stage_failed: FailedStage::Ingest,
            error_type: "insert_error".into(),
            error_message: "boom".into(),
            retry_count: 0,
            max_retries: FailedRecord::DEFAULT_MAX_RETRIES,
            next_retry_at: None,
            resolved_at: None,
            created_at: "2026-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn retryable_until_retry_budget_exhausted() {
        let mut rec = sample();
        assert!(rec.is_retryable());
        rec.retry_count = 3;
        assert!(!rec.is_retryable());
    }

    #[test]
    fn resolved_record_is_never_retryable() {
        let mut rec = sample();
        rec.resolved_at = Some("2026-01-02T00:00:00Z".into());
        assert!(!rec.is_retryable());
    }
}
