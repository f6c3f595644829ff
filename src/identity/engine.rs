//! Wires the BK hash, DH hash, row-version extraction, and the
//! human-readable reference string into a single identity-stamping step
//! (§4.1).

use super::{bk_hash, data_hash, rowversion};
use crate::error::SyncResult;
use crate::model::record::{
    FIELD_BK_HASH, FIELD_DATA_HASH, FIELD_REF_STR, FIELD_ROWVERSION, value_to_canonical_string,
};
use crate::model::Record;

/// Field to pull the row-version from, and the extra fields (beyond the
/// standard bookkeeping set) to exclude when computing the data hash.
pub struct IdentityEngine {
    pub business_key_fields: Vec<String>,
    pub entity_name: String,
    pub rowversion_field: Option<String>,
    pub extra_excluded_fields: Vec<String>,
}

impl IdentityEngine {
    pub fn new(entity_name: impl Into<String>, business_key_fields: Vec<String>) -> Self {
        Self {
            business_key_fields,
            entity_name: entity_name.into(),
            rowversion_field: None,
            extra_excluded_fields: Vec::new(),
        }
    }

    pub fn with_rowversion_field(mut self, field: impl Into<String>) -> Self {
        self.rowversion_field = Some(field.into());
        self
    }

    pub fn with_extra_excluded_fields(mut self, fields: Vec<String>) -> Self {
        self.extra_excluded_fields = fields;
        self
    }

    /// Stamp `erp_key_hash`, `erp_data_hash`, `erp_rowversion`, and
    /// `erp_ref_str` onto `record`, returning the augmented record.
    pub fn add_identity(&self, mut record: Record) -> SyncResult<Record> {
        let bk = bk_hash::generate(&record, &self.business_key_fields, Some(&self.entity_name))?;

        let excluded: Vec<&str> = self
            .extra_excluded_fields
            .iter()
            .map(String::as_str)
            .collect();
        let dh = data_hash::generate(&record, &excluded);

        let rv = self
            .rowversion_field
            .as_ref()
            .and_then(|f| record.get(f))
            .and_then(rowversion::extract);

        let reference = self.reference_string(&record);

        record.insert(FIELD_BK_HASH.to_string(), bk.into());
        record.insert(FIELD_DATA_HASH.to_string(), dh.into());
        record.insert(
            FIELD_ROWVERSION.to_string(),
            rv.map(Into::into).unwrap_or(serde_json::Value::Null),
        );
        record.insert(FIELD_REF_STR.to_string(), reference.into());

        Ok(record)
    }

    pub fn add_identity_batch(&self, records: Vec<Record>) -> SyncResult<Vec<Record>> {
        records
            .into_iter()
            .map(|r| self.add_identity(r))
            .collect()
    }

    /// Human-readable reference built from the business-key fields in their
    /// configured order (not sorted), skipping any that are null.
    fn reference_string(&self, record: &Record) -> String {
        let parts: Vec<String> = self
            .business_key_fields
            .iter()
            .filter_map(|field| {
                record
                    .get(field)
                    .filter(|v| !v.is_null())
                    .map(|v| format!("{field}={}", value_to_canonical_string(v)))
            })
            .collect();
        format!("{}[{}]", self.entity_name, parts.join(","))
    }

    /// Re-derive BK and DH and confirm they match what is already stamped on
    /// the record — used to detect tampering or a stale identity stamp.
    pub fn validate_identity(&self, record: &Record) -> SyncResult<bool> {
        let expected_bk =
            bk_hash::generate(record, &self.business_key_fields, Some(&self.entity_name))?;
        let excluded: Vec<&str> = self
            .extra_excluded_fields
            .iter()
            .map(String::as_str)
            .collect();
        let expected_dh = data_hash::generate(record, &excluded);

        let actual_bk = record.get(FIELD_BK_HASH).and_then(|v| v.as_str());
        let actual_dh = record.get(FIELD_DATA_HASH).and_then(|v| v.as_str());

        Ok(actual_bk == Some(expected_bk.as_str()) && actual_dh == Some(expected_dh.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record() -> Record {
        let mut r = Record::new();
        r.insert("item_id".to_string(), json!("A100"));
        r.insert("qty".to_string(), json!(42));
        r.insert("last_modified".to_string(), json!("2026-01-01T00:00:00Z"));
        r
    }

    fn engine() -> IdentityEngine {
        IdentityEngine::new("inventory_items", vec!["item_id".to_string()])
            .with_rowversion_field("last_modified")
    }

    #[test]
    fn stamps_all_identity_fields() {
        let stamped = engine().add_identity(sample_record()).unwrap();
        assert!(stamped.contains_key(FIELD_BK_HASH));
        assert!(stamped.contains_key(FIELD_DATA_HASH));
        assert!(stamped.contains_key(FIELD_ROWVERSION));
        assert!(stamped.contains_key(FIELD_REF_STR));
        assert_eq!(
            stamped.get(FIELD_ROWVERSION).unwrap().as_str(),
            Some("2026-01-01T00:00:00Z")
        );
    }

    #[test]
    fn rowversion_is_null_when_field_absent() {
        let eng = IdentityEngine::new("inventory_items", vec!["item_id".to_string()]);
        let stamped = eng.add_identity(sample_record()).unwrap();
        assert!(stamped.get(FIELD_ROWVERSION).unwrap().is_null());
    }

    #[test]
    fn reference_string_uses_configured_field_order_not_sorted() {
        let eng = IdentityEngine::new(
            "inventory_items",
            vec!["warehouse".to_string(), "item_id".to_string()],
        );
        let mut r = Record::new();
        r.insert("warehouse".to_string(), json!("W1"));
        r.insert("item_id".to_string(), json!("A100"));
        let stamped = eng.add_identity(r).unwrap();
        assert_eq!(
            stamped.get(FIELD_REF_STR).unwrap().as_str().unwrap(),
            "inventory_items[warehouse=W1,item_id=A100]"
        );
    }

    #[test]
    fn validate_identity_detects_tampering() {
        let eng = engine();
        let mut stamped = eng.add_identity(sample_record()).unwrap();
        assert!(eng.validate_identity(&stamped).unwrap());

        stamped.insert(FIELD_DATA_HASH.to_string(), json!("deadbeef"));
        assert!(!eng.validate_identity(&stamped).unwrap());
    }

    #[test]
    fn batch_stamps_every_record() {
        let eng = engine();
        let records = vec![sample_record(), sample_record()];
        let stamped = eng.add_identity_batch(records).unwrap();
        assert_eq!(stamped.len(), 2);
        assert!(stamped.iter().all(|r| r.contains_key(FIELD_BK_HASH)));
    }
}
