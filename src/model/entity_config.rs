use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for one synced entity: where to fetch it from, what forms
/// its business key, and how its foreign keys to other entities resolve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConfig {
    pub uid: String,
    pub entity_name: String,
    pub source_api_slug: String,
    pub business_key_fields: Vec<String>,
    pub rowversion_field: Option<String>,
    pub sync_enabled: bool,
    pub sync_schedule: Option<String>,
    pub parent_refs_config: HashMap<String, ParentRefConfig>,
    pub created_at: String,
}

/// One declared parent reference: `child[child_field]` is assumed to equal
/// `parent[parent_field]` in the parent entity's business key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentRefConfig {
    pub parent_entity: String,
    pub parent_field: String,
    pub child_field: String,
}
