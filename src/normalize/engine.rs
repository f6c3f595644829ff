//! Normalizer engine: wires the five layers into the strict composition
//! `L1 ∘ L2 ∘ L3 ∘ L4 ∘ L5` (§4.2).

use std::collections::{HashMap, HashSet};

use super::field_map::{self, ValidationError};
use super::field_type::FieldType;
use super::{coerce, datetime, numeric, string_clean};
use crate::model::{FieldMapping, Record};

#[derive(Debug, Default, Clone)]
pub struct NormalizerConfig {
    pub declared_types: HashMap<String, FieldType>,
    pub numeric_fields: HashSet<String>,
    pub datetime_fields: HashSet<String>,
    pub field_mappings: Vec<FieldMapping>,
}

#[derive(Debug, Default, Clone)]
pub struct BatchMetrics {
    pub total_rows: usize,
    pub successful: usize,
    pub failed: usize,
    pub success_rate: f64,
}

#[derive(Debug, Clone)]
pub struct RowFailure {
    pub index: usize,
    pub errors: Vec<ValidationError>,
}

pub struct Normalizer<'a> {
    config: &'a NormalizerConfig,
}

impl<'a> Normalizer<'a> {
    pub fn new(config: &'a NormalizerConfig) -> Self {
        Self { config }
    }

    /// Run a single record through all five layers. Required-field
    /// violations are returned alongside the result rather than aborting.
    pub fn normalize(&self, record: &Record) -> (Record, Vec<ValidationError>) {
        let l1 = coerce::apply(record, &self.config.declared_types);
        let l2 = string_clean::apply(&l1);
        let l3 = numeric::apply(&l2, &self.config.numeric_fields);
        let l4 = datetime::apply(&l3, &self.config.datetime_fields);
        field_map::apply(&l4, &self.config.field_mappings)
    }

    pub fn validate_row(&self, record: &Record) -> Vec<ValidationError> {
        field_map::validate_row(record, &self.config.field_mappings)
    }

    /// Process a batch, collecting per-row failures and returning metrics
    /// alongside the successfully normalized records.
    pub fn normalize_batch(
        &self,
        records: &[Record],
    ) -> (Vec<Record>, Vec<RowFailure>, BatchMetrics) {
        let mut successful = Vec::new();
        let mut failures = Vec::new();

        for (index, record) in records.iter().enumerate() {
            let (normalized, errors) = self.normalize(record);
            if errors.is_empty() {
                successful.push(normalized);
            } else {
                failures.push(RowFailure { index, errors });
            }
        }

        let total_rows = records.len();
        let success_rate = if total_rows == 0 {
            0.0
        } else {
            (successful.len() as f64 / total_rows as f64) * 100.0
        };

        let metrics = BatchMetrics {
            total_rows,
            successful: successful.len(),
            failed: failures.len(),
            success_rate,
        };

        (successful, failures, metrics)
    }

    /// Partition records by their required-field check without running the
    /// full pipeline.
    pub fn validate_batch(&self, records: &[Record]) -> (Vec<Record>, Vec<RowFailure>) {
        let mut valid = Vec::new();
        let mut invalid = Vec::new();
        for (index, record) in records.iter().enumerate() {
            let errors = self.validate_row(record);
            if errors.is_empty() {
                valid.push(record.clone());
            } else {
                invalid.push(RowFailure { index, errors });
            }
        }
        (valid, invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Transformation;
    use serde_json::json;

    fn config() -> NormalizerConfig {
        let mut declared_types = HashMap::new();
        declared_types.insert("qty".to_string(), FieldType::Integer);

        let mut numeric_fields = HashSet::new();
        numeric_fields.insert("price".to_string());

        NormalizerConfig {
            declared_types,
            numeric_fields,
            datetime_fields: HashSet::new(),
            field_mappings: vec![
                FieldMapping {
                    entity_name: "inventory_items".to_string(),
                    source_field: "qty".to_string(),
                    target_field: "quantity".to_string(),
                    transformation: Transformation::None,
                    is_required: true,
                    default_value: None,
                },
                FieldMapping {
                    entity_name: "inventory_items".to_string(),
                    source_field: "price".to_string(),
                    target_field: "price".to_string(),
                    transformation: Transformation::None,
                    is_required: false,
                    default_value: None,
                },
                FieldMapping {
                    entity_name: "inventory_items".to_string(),
                    source_field: "name".to_string(),
                    target_field: "name".to_string(),
                    transformation: Transformation::Trim,
                    is_required: false,
                    default_value: None,
                },
            ],
        }
    }

    fn record(pairs: &[(&str, serde_json::Value)]) -> Record {
        let mut r = Record::new();
        for (k, v) in pairs {
            r.insert((*k).to_string(), v.clone());
        }
        r
    }

    #[test]
    fn runs_all_five_layers_in_sequence() {
        let cfg = config();
        let engine = Normalizer::new(&cfg);
        let r = record(&[
            ("qty", json!("7")),
            ("price", json!("$1,234.50")),
            ("name", json!("  Widget  ")),
        ]);
        let (normalized, errors) = engine.normalize(&r);
        assert!(errors.is_empty());
        assert_eq!(normalized.get("quantity"), Some(&json!(7)));
        assert_eq!(normalized.get("price"), Some(&json!(1234.50)));
        assert_eq!(normalized.get("name"), Some(&json!("Widget")));
    }

    #[test]
    fn required_field_failure_reported_without_aborting_pipeline() {
        let cfg = config();
        let engine = Normalizer::new(&cfg);
        let r = record(&[("price", json!("10"))]);
        let (normalized, errors) = engine.normalize(&r);
        assert!(normalized.contains_key("quantity"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn batch_reports_metrics_and_partitions_failures() {
        let cfg = config();
        let engine = Normalizer::new(&cfg);
        let rows = vec![
            record(&[("qty", json!("1")), ("price", json!("5"))]),
            record(&[("price", json!("5"))]),
        ];
        let (successful, failures, metrics) = engine.normalize_batch(&rows);
        assert_eq!(successful.len(), 1);
        assert_eq!(failures.len(), 1);
        assert_eq!(metrics.total_rows, 2);
        assert_eq!(metrics.success_rate, 50.0);
    }

    #[test]
    fn validate_batch_partitions_without_running_full_pipeline() {
        let cfg = config();
        let engine = Normalizer::new(&cfg);
        let rows = vec![
            record(&[("qty", json!("1"))]),
            record(&[("price", json!("5"))]),
        ];
        let (valid, invalid) = engine.validate_batch(&rows);
        assert_eq!(valid.len(), 1);
        assert_eq!(invalid.len(), 1);
    }
}
