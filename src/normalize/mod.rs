//! The five-layer normalization pipeline (§4.2): type coercion, string
//! cleaning, numeric parsing, datetime parsing, and field mapping.

pub mod coerce;
pub mod datetime;
pub mod engine;
pub mod field_map;
pub mod field_type;
pub mod numeric;
pub mod string_clean;

pub use engine::{BatchMetrics, Normalizer, NormalizerConfig, RowFailure};
pub use field_map::ValidationError;
pub use field_type::FieldType;
