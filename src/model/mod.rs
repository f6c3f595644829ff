pub mod background_schedule;
pub mod entity_config;
pub mod failed_record;
pub mod field_mapping;
pub mod pending_child;
pub mod record;
pub mod sync_batch;
pub mod sync_state;

pub use background_schedule::BackgroundSchedule;
pub use entity_config::{EntityConfig, ParentRefConfig};
pub use failed_record::{FailedRecord, FailedStage};
pub use field_mapping::{FieldMapping, Transformation};
pub use pending_child::PendingChild;
pub use record::Record;
pub use sync_batch::{BatchMetrics, BatchStatus, SyncBatch, SyncType};
pub use sync_state::SyncState;
