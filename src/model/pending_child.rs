use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A child record queued because its parent's business key was not yet
/// present in the sink at DELTA/RESOLVE time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingChild {
    pub uid: String,
    pub batch_uid: String,
    pub child_entity: String,
    pub parent_entity: String,
    pub parent_bk_hash: String,
    pub child_payload: Value,
    pub retry_count: i64,
    pub max_retries: i64,
    pub next_retry_at: Option<String>,
    pub resolved_at: Option<String>,
    pub created_at: String,
}

impl PendingChild {
    pub const DEFAULT_MAX_RETRIES: i64 = 5;

    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }

    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}
