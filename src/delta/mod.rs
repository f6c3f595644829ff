//! Delta engine (§4.3): classifies incoming records against the sink's
//! current state into INSERT/UPDATE/SKIP/DELETE buckets.

use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::identity::rowversion;
use crate::model::record::{FIELD_BK_HASH, FIELD_DATA_HASH, FIELD_ROWVERSION};
use crate::model::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaOperation {
    Insert,
    Update,
    Skip,
    Delete,
}

impl DeltaOperation {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Skip => "skip",
            Self::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeltaRecord {
    pub operation: DeltaOperation,
    pub bk_hash: String,
    pub record: Record,
    /// Present for UPDATE/DELETE: the sink-side uid to target.
    pub uid: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaStrategy {
    RowVersion,
    Hash,
    Auto,
}

impl DeltaStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            Self::RowVersion => "row_version",
            Self::Hash => "hash",
            Self::Auto => "auto",
        }
    }
}

/// Minimal view of a stored sink record needed for classification.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub bk_hash: String,
    pub data_hash: String,
    pub rowversion: Option<String>,
    pub uid: String,
}

#[derive(Debug, Default, Clone)]
pub struct DeltaMetrics {
    pub total: usize,
    pub insert: usize,
    pub update: usize,
    pub skip: usize,
    pub delete: usize,
    pub efficiency_percent: f64,
    pub strategy_used: &'static str,
}

#[derive(Debug, Clone)]
pub struct ClassifyWarning {
    pub bk_hash: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DeltaResult {
    pub insert: Vec<DeltaRecord>,
    pub update: Vec<DeltaRecord>,
    pub skip: Vec<DeltaRecord>,
    pub delete: Vec<DeltaRecord>,
    pub metrics: DeltaMetrics,
    pub warnings: Vec<ClassifyWarning>,
}

/// Classify `incoming` against `stored`. `exhaustive` marks whether the
/// incoming set is known to be complete (full sync) — only then are DELETEs
/// generated from the set-difference.
pub fn classify(
    incoming: &[Record],
    stored: &[StoredRecord],
    strategy: DeltaStrategy,
    exhaustive: bool,
) -> DeltaResult {
    let effective_strategy = resolve_strategy(incoming, strategy);

    let stored_by_bk: HashMap<&str, &StoredRecord> =
        stored.iter().map(|s| (s.bk_hash.as_str(), s)).collect();

    let mut insert = Vec::new();
    let mut update = Vec::new();
    let mut skip = Vec::new();
    let mut warnings = Vec::new();
    let mut seen_bk: HashMap<String, usize> = HashMap::new();
    let mut deduped: Vec<Record> = Vec::new();

    for record in incoming {
        let bk = match record.get(FIELD_BK_HASH).and_then(Value::as_str) {
            Some(bk) if !bk.is_empty() => bk.to_string(),
            _ => {
                warnings.push(ClassifyWarning {
                    bk_hash: None,
                    message: "incoming record missing erp_key_hash, dropped".to_string(),
                });
                continue;
            }
        };

        if let Some(&idx) = seen_bk.get(&bk) {
            warnings.push(ClassifyWarning {
                bk_hash: Some(bk.clone()),
                message: "duplicate bk_hash in incoming batch, earlier record superseded"
                    .to_string(),
            });
            deduped[idx] = record.clone();
        } else {
            seen_bk.insert(bk, deduped.len());
            deduped.push(record.clone());
        }
    }

    let incoming_bks: HashSet<String> = deduped
        .iter()
        .filter_map(|r| r.get(FIELD_BK_HASH).and_then(Value::as_str))
        .map(|s| s.to_string())
        .collect();

    for record in deduped {
        let bk = record
            .get(FIELD_BK_HASH)
            .and_then(Value::as_str)
            .unwrap()
            .to_string();

        let delta_record = match stored_by_bk.get(bk.as_str()) {
            None => DeltaRecord {
                operation: DeltaOperation::Insert,
                bk_hash: bk,
                record,
                uid: None,
            },
            Some(stored_rec) => {
                classify_against_stored(record, bk, stored_rec, effective_strategy)
            }
        };

        match delta_record.operation {
            DeltaOperation::Insert => insert.push(delta_record),
            DeltaOperation::Update => update.push(delta_record),
            DeltaOperation::Skip => skip.push(delta_record),
            DeltaOperation::Delete => unreachable!("deletes are derived below, not classified"),
        }
    }

    let delete = if exhaustive {
        stored
            .iter()
            .filter(|s| !incoming_bks.contains(&s.bk_hash))
            .map(|s| DeltaRecord {
                operation: DeltaOperation::Delete,
                bk_hash: s.bk_hash.clone(),
                record: Record::new(),
                uid: Some(s.uid.clone()),
            })
            .collect()
    } else {
        Vec::new()
    };

    let total = insert.len() + update.len() + skip.len() + delete.len();
    let acted = insert.len() + update.len() + delete.len();
    let efficiency_percent = if total == 0 {
        0.0
    } else {
        (round2((acted as f64 / total as f64) * 100.0)).max(0.0)
    };

    let metrics = DeltaMetrics {
        total,
        insert: insert.len(),
        update: update.len(),
        skip: skip.len(),
        delete: delete.len(),
        efficiency_percent,
        strategy_used: effective_strategy.label(),
    };

    DeltaResult {
        insert,
        update,
        skip,
        delete,
        metrics,
        warnings,
    }
}

fn classify_against_stored(
    record: Record,
    bk: String,
    stored: &StoredRecord,
    strategy: DeltaStrategy,
) -> DeltaRecord {
    let incoming_rv = record
        .get(FIELD_ROWVERSION)
        .and_then(rowversion::extract);

    // Mixed rowversion presence always falls back to hash, even under the
    // row_version strategy (§4.3 tie-breaks).
    let effective = if strategy == DeltaStrategy::RowVersion
        && (incoming_rv.is_none() != stored.rowversion.is_none())
    {
        DeltaStrategy::Hash
    } else {
        strategy
    };

    let op = match effective {
        DeltaStrategy::RowVersion => match (&incoming_rv, &stored.rowversion) {
            (Some(incoming), Some(stored_rv)) => {
                if rowversion::is_newer(incoming, stored_rv) {
                    DeltaOperation::Update
                } else if rowversion::is_equal(incoming, stored_rv) {
                    DeltaOperation::Skip
                } else {
                    DeltaOperation::Skip
                }
            }
            _ => compare_by_hash(&record, &stored.data_hash),
        },
        DeltaStrategy::Hash | DeltaStrategy::Auto => compare_by_hash(&record, &stored.data_hash),
    };

    DeltaRecord {
        operation: op,
        bk_hash: bk,
        record,
        uid: Some(stored.uid.clone()),
    }
}

fn compare_by_hash(record: &Record, stored_dh: &str) -> DeltaOperation {
    let incoming_dh = record.get(FIELD_DATA_HASH).and_then(Value::as_str);
    match incoming_dh {
        Some(dh) if dh == stored_dh => DeltaOperation::Skip,
        _ => DeltaOperation::Update,
    }
}

/// AUTO strategy resolution (§4.3, §12): inspects the whole incoming batch,
/// not a sample — one row lacking a row-version forces hash for everyone.
fn resolve_strategy(incoming: &[Record], requested: DeltaStrategy) -> DeltaStrategy {
    if requested != DeltaStrategy::Auto {
        return requested;
    }

    let all_have_rowversion = !incoming.is_empty()
        && incoming.iter().all(|r| {
            r.get(FIELD_ROWVERSION)
                .and_then(rowversion::extract)
                .is_some()
        });

    if all_have_rowversion {
        DeltaStrategy::RowVersion
    } else {
        DeltaStrategy::Hash
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn incoming_record(bk: &str, dh: &str, rv: Option<&str>) -> Record {
        let mut r = Record::new();
        r.insert(FIELD_BK_HASH.to_string(), json!(bk));
        r.insert(FIELD_DATA_HASH.to_string(), json!(dh));
        r.insert(
            FIELD_ROWVERSION.to_string(),
            rv.map(|v| json!(v)).unwrap_or(Value::Null),
        );
        r
    }

    fn stored(bk: &str, dh: &str, rv: Option<&str>, uid: &str) -> StoredRecord {
        StoredRecord {
            bk_hash: bk.to_string(),
            data_hash: dh.to_string(),
            rowversion: rv.map(str::to_string),
            uid: uid.to_string(),
        }
    }

    #[test]
    fn missing_stored_is_insert() {
        let incoming = vec![incoming_record("bk1", "dh1", None)];
        let result = classify(&incoming, &[], DeltaStrategy::Hash, false);
        assert_eq!(result.insert.len(), 1);
        assert_eq!(result.metrics.strategy_used, "hash");
    }

    #[test]
    fn hash_strategy_skip_on_match_update_on_difference() {
        let incoming = vec![
            incoming_record("bk1", "dh1", None),
            incoming_record("bk2", "dh_new", None),
        ];
        let stored_recs = vec![
            stored("bk1", "dh1", None, "u1"),
            stored("bk2", "dh_old", None, "u2"),
        ];
        let result = classify(&incoming, &stored_recs, DeltaStrategy::Hash, false);
        assert_eq!(result.skip.len(), 1);
        assert_eq!(result.update.len(), 1);
    }

    #[test]
    fn rowversion_strategy_compares_versions() {
        let incoming = vec![incoming_record("bk1", "dh1", Some("5"))];
        let stored_recs = vec![stored("bk1", "dh0", Some("3"), "u1")];
        let result = classify(&incoming, &stored_recs, DeltaStrategy::RowVersion, false);
        assert_eq!(result.update.len(), 1);
    }

    #[test]
    fn mixed_rowversion_presence_falls_back_to_hash() {
        let incoming = vec![incoming_record("bk1", "dh1", Some("5"))];
        let stored_recs = vec![stored("bk1", "dh1", None, "u1")];
        let result = classify(&incoming, &stored_recs, DeltaStrategy::RowVersion, false);
        assert_eq!(result.skip.len(), 1);
    }

    #[test]
    fn auto_strategy_checks_whole_batch_not_first_row() {
        let incoming = vec![
            incoming_record("bk1", "dh1", Some("5")),
            incoming_record("bk2", "dh2", None),
        ];
        let result = classify(&incoming, &[], DeltaStrategy::Auto, false);
        assert_eq!(result.metrics.strategy_used, "hash");
    }

    #[test]
    fn delete_detection_only_when_exhaustive() {
        let incoming = vec![incoming_record("bk1", "dh1", None)];
        let stored_recs = vec![
            stored("bk1", "dh1", None, "u1"),
            stored("bk_gone", "dh_gone", None, "u2"),
        ];
        let non_exhaustive = classify(&incoming, &stored_recs, DeltaStrategy::Hash, false);
        assert_eq!(non_exhaustive.delete.len(), 0);

        let exhaustive = classify(&incoming, &stored_recs, DeltaStrategy::Hash, true);
        assert_eq!(exhaustive.delete.len(), 1);
        assert_eq!(exhaustive.delete[0].uid.as_deref(), Some("u2"));
    }

    #[test]
    fn missing_bk_dropped_with_warning() {
        let mut no_bk = Record::new();
        no_bk.insert(FIELD_DATA_HASH.to_string(), json!("dh"));
        let result = classify(&[no_bk], &[], DeltaStrategy::Hash, false);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.metrics.total, 0);
    }

    #[test]
    fn duplicate_bk_last_wins() {
        let incoming = vec![
            incoming_record("bk1", "dh_first", None),
            incoming_record("bk1", "dh_second", None),
        ];
        let result = classify(&incoming, &[], DeltaStrategy::Hash, false);
        assert_eq!(result.insert.len(), 1);
        assert_eq!(
            result.insert[0].record.get(FIELD_DATA_HASH).unwrap(),
            &json!("dh_second")
        );
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn efficiency_percent_rounds_to_two_decimals() {
        let incoming = vec![
            incoming_record("bk1", "dh1", None),
            incoming_record("bk2", "dh2", None),
            incoming_record("bk3", "dh3", None),
        ];
        let stored_recs = vec![stored("bk3", "dh3", None, "u3")];
        let result = classify(&incoming, &stored_recs, DeltaStrategy::Hash, false);
        assert_eq!(result.metrics.insert, 2);
        assert_eq!(result.metrics.skip, 1);
        assert_eq!(result.metrics.efficiency_percent, 66.67);
    }
}
