use serde::{Deserialize, Serialize};

/// Per-`(entity_name, source_system)` sync cursor. Exactly one row exists
/// per pair (unique constraint enforced at the schema level).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SyncState {
    pub entity_name: String,
    pub source_system: String,
    pub last_sync_rowversion: Option<String>,
    pub last_sync_timestamp: Option<String>,
    pub last_batch_uid: Option<String>,
}
