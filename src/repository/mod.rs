//! State store: one module per table, following the host crate's own
//! free-function-over-`SqlitePool` repository convention rather than a
//! trait-object-per-entity abstraction.

pub mod background_schedule_repository;
pub mod batch_repository;
pub mod entity_config_repository;
pub mod failed_record_repository;
pub mod field_mapping_repository;
pub mod pending_child_repository;
pub mod sync_state_repository;
