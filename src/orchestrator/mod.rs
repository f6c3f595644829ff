//! Orchestrator (§4.5): the nine-stage pipeline that turns one sync request
//! into fetched records, normalized and identity-stamped, diffed against the
//! sink, resolved against their parents, and ingested.

use std::collections::HashMap;

use log::info;
use serde_json::{Map, Value};
use sqlx::SqlitePool;

use crate::api::{sink_client::UpdateOp, SinkClient, SourceClient};
use crate::delta::{self, DeltaStrategy, StoredRecord};
use crate::error::{SyncError, SyncResult};
use crate::identity::{rowversion, IdentityEngine};
use crate::model::record::{FIELD_BK_HASH, FIELD_ROWVERSION};
use crate::model::{
    BatchMetrics, BatchStatus, EntityConfig, FailedRecord, FailedStage, ParentRefConfig, Record, SyncBatch,
    SyncType,
};
use crate::normalize::{Normalizer, NormalizerConfig};
use crate::repository::{batch_repository, failed_record_repository, sync_state_repository};
use crate::resolver;

/// Everything the orchestrator needs to run one sync, beyond the entity's
/// persisted config: the normalizer's declared/numeric/datetime field sets
/// (not part of the state-store schema, since they describe the source
/// shape rather than sync bookkeeping), and the window of records to fetch.
pub struct SyncRequest {
    pub entity_config: EntityConfig,
    pub source_system: String,
    pub normalizer_config: NormalizerConfig,
    pub extra_excluded_fields: Vec<String>,
    pub sync_type: SyncType,
    pub page_size: u32,
    pub max_pages: Option<u32>,
    pub delta_strategy: DeltaStrategy,
    pub filters: Option<Value>,
    pub sort: Option<Value>,
    /// Background-sync slicing (§4.8): folded into the fetch filters rather
    /// than threaded as a distinct fetch mode, so full/incremental/background
    /// all go through the same FETCH stage.
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

struct RunSummary {
    metrics: BatchMetrics,
    max_rowversion: Option<String>,
    empty_fetch_message: Option<String>,
}

struct ResolvedRecord {
    raw: Value,
    record: Record,
    refs: HashMap<String, resolver::ResolvedParentRef>,
}

pub struct Orchestrator<'a> {
    pool: &'a SqlitePool,
    source: &'a SourceClient,
    sink: &'a SinkClient,
}

impl<'a> Orchestrator<'a> {
    pub fn new(pool: &'a SqlitePool, source: &'a SourceClient, sink: &'a SinkClient) -> Self {
        Self { pool, source, sink }
    }

    /// Run one sync to completion, returning the final batch row. Stage
    /// errors propagate out of `run_inner` and are recorded as a `failed`
    /// batch rather than aborting without a trace.
    pub async fn run(&self, request: SyncRequest) -> SyncResult<SyncBatch> {
        let entity_name = request.entity_config.entity_name.clone();

        if let Some(latest) = batch_repository::get_latest_batch(self.pool, &entity_name).await? {
            if latest.status == BatchStatus::Running {
                return Err(SyncError::already_exists(format!(
                    "a sync for '{entity_name}' is already running (batch {})",
                    latest.uid
                )));
            }
        }

        let batch = batch_repository::create_batch(
            self.pool,
            &entity_name,
            request.sync_type,
            Some(request.source_system.as_str()),
            Some(request.entity_config.source_api_slug.as_str()),
        )
        .await?;

        match self.run_inner(&batch.uid, &request).await {
            Ok(summary) => {
                batch_repository::update_metrics(self.pool, &batch.uid, &summary.metrics).await?;

                if let Some(rv) = &summary.max_rowversion {
                    batch_repository::update_last_rowversion(self.pool, &batch.uid, rv).await?;
                    sync_state_repository::advance(
                        self.pool,
                        &entity_name,
                        &request.source_system,
                        Some(rv.as_str()),
                        &batch.uid,
                    )
                    .await?;
                }

                batch_repository::update_status(
                    self.pool,
                    &batch.uid,
                    BatchStatus::Completed,
                    summary.empty_fetch_message.as_deref(),
                )
                .await?;
            }
            Err(err) => {
                batch_repository::update_status(self.pool, &batch.uid, BatchStatus::Failed, Some(err.message.as_str()))
                    .await?;
                return Err(err);
            }
        }

        batch_repository::get_batch(self.pool, &batch.uid)
            .await?
            .ok_or_else(|| SyncError::sync_execution("batch row vanished immediately after completion"))
    }

    async fn run_inner(&self, batch_uid: &str, request: &SyncRequest) -> SyncResult<RunSummary> {
        let entity_name = &request.entity_config.entity_name;

        info!("[stage 1/9] FETCH entity={entity_name}");
        let raw_records = self.fetch(request).await?;

        if raw_records.is_empty() {
            batch_repository::mark_started(self.pool, batch_uid, 0).await?;
            return Ok(RunSummary {
                metrics: BatchMetrics::default(),
                max_rowversion: None,
                empty_fetch_message: Some("no records fetched, nothing to sync".to_string()),
            });
        }

        batch_repository::mark_started(self.pool, batch_uid, raw_records.len() as i64).await?;

        let mut records_failed = 0i64;

        info!("[stage 2/9] NORMALIZE entity={entity_name} fetched={}", raw_records.len());
        info!("[stage 3/9] VALIDATE entity={entity_name}");
        info!("[stage 4/9] MAP entity={entity_name}");
        let normalizer = Normalizer::new(&request.normalizer_config);
        let mut mapped: Vec<(Value, Record)> = Vec::with_capacity(raw_records.len());

        for raw in &raw_records {
            let Some(source_record) = raw.as_object().cloned() else {
                failed_record_repository::create(
                    self.pool,
                    batch_uid,
                    entity_name,
                    raw,
                    None,
                    None,
                    FailedStage::Normalize,
                    "malformed_record",
                    "fetched record is not a JSON object",
                    FailedRecord::DEFAULT_MAX_RETRIES,
                )
                .await?;
                records_failed += 1;
                continue;
            };

            let (mapped_record, errors) = normalizer.normalize(&source_record);
            if errors.is_empty() {
                mapped.push((raw.clone(), mapped_record));
                continue;
            }

            let message = errors
                .iter()
                .map(|e| e.message.clone())
                .collect::<Vec<_>>()
                .join("; ");
            failed_record_repository::create(
                self.pool,
                batch_uid,
                entity_name,
                raw,
                None,
                Some(&Value::Object(mapped_record)),
                FailedStage::Validate,
                "required_field_missing",
                &message,
                FailedRecord::DEFAULT_MAX_RETRIES,
            )
            .await?;
            records_failed += 1;
        }

        info!("[stage 5/9] IDENTITY entity={entity_name} count={}", mapped.len());
        let identity_engine = build_identity_engine(&request.entity_config, &request.extra_excluded_fields);
        let mut stamped: Vec<(Value, Record)> = Vec::with_capacity(mapped.len());

        for (raw, record) in mapped {
            match identity_engine.add_identity(record.clone()) {
                Ok(stamped_record) => stamped.push((raw, stamped_record)),
                Err(err) => {
                    failed_record_repository::create(
                        self.pool,
                        batch_uid,
                        entity_name,
                        &raw,
                        None,
                        Some(&Value::Object(record)),
                        FailedStage::Identity,
                        "identity_generation",
                        &err.message,
                        FailedRecord::DEFAULT_MAX_RETRIES,
                    )
                    .await?;
                    records_failed += 1;
                }
            }
        }

        let max_rowversion = stamped
            .iter()
            .filter_map(|(_, r)| r.get(FIELD_ROWVERSION).and_then(rowversion::extract))
            .reduce(|a, b| if rowversion::is_newer(&b, &a) { b } else { a });

        info!("[stage 5.5/9] PARENT_REFS entity={entity_name}");
        let ordered_ref_names = ordered_ref_names(&request.entity_config.parent_refs_config);

        let resolved: Vec<ResolvedRecord> = stamped
            .into_iter()
            .map(|(raw, record)| {
                let refs = resolver::compute_parent_refs(&record, &request.entity_config.parent_refs_config);
                ResolvedRecord { raw, record, refs }
            })
            .collect();

        let by_bk: HashMap<String, &ResolvedRecord> = resolved
            .iter()
            .filter_map(|r| r.record.get(FIELD_BK_HASH).and_then(Value::as_str).map(|bk| (bk.to_string(), r)))
            .collect();

        info!("[stage 6/9] DELTA entity={entity_name}");
        let incoming: Vec<Record> = resolved.iter().map(|r| r.record.clone()).collect();
        let bks: Vec<String> = incoming
            .iter()
            .filter_map(|r| r.get(FIELD_BK_HASH).and_then(Value::as_str).map(str::to_string))
            .collect();
        let sink_by_bk = self.sink.get_batch_by_bk_hashes(entity_name, &bks).await?;
        let stored: Vec<StoredRecord> = sink_by_bk
            .iter()
            .filter_map(|(bk, value)| stored_record_from_sink(bk, value))
            .collect();

        let exhaustive = request.sync_type == SyncType::Full;
        let delta_result = delta::classify(&incoming, &stored, request.delta_strategy, exhaustive);
        for warning in &delta_result.warnings {
            log::warn!("delta warning for {entity_name}: {}", warning.message);
        }

        info!("[stage 7/9] RESOLVE entity={entity_name} pending_check={}", delta_result.insert.len() + delta_result.update.len());
        let mut final_insert = Vec::new();
        let mut final_update = Vec::new();
        let mut update_raw_by_uid: HashMap<String, Value> = HashMap::new();
        let mut pending_count = 0i64;

        for delta_record in delta_result.insert.into_iter().chain(delta_result.update.into_iter()) {
            let raw = by_bk
                .get(delta_record.bk_hash.as_str())
                .map(|r| r.raw.clone())
                .unwrap_or_else(|| Value::Object(delta_record.record.clone()));
            let refs = by_bk
                .get(delta_record.bk_hash.as_str())
                .map(|r| r.refs.clone())
                .unwrap_or_default();

            if !refs.is_empty() {
                if let resolver::ResolutionOutcome::Blocked { parent_entity, parent_bk_hash } =
                    resolver::check_parents_exist(self.sink, &refs, &ordered_ref_names).await?
                {
                    resolver::queue_pending_child(
                        self.pool,
                        batch_uid,
                        entity_name,
                        &parent_entity,
                        &parent_bk_hash,
                        &raw,
                    )
                    .await?;
                    pending_count += 1;
                    continue;
                }
            }

            if let Some(uid) = &delta_record.uid {
                update_raw_by_uid.insert(uid.clone(), raw);
            }
            route_by_operation(delta_record, &mut final_insert, &mut final_update);
        }

        info!(
            "[stage 8/9] INGEST entity={entity_name} insert={} update={} delete={}",
            final_insert.len(),
            final_update.len(),
            delta_result.delete.len()
        );

        let insert_payloads: Vec<Value> = final_insert.iter().map(|r: &Record| Value::Object(r.clone())).collect();
        let insert_result = self.sink.batch_insert(entity_name, &insert_payloads).await?;
        for failure in &insert_result.failures {
            let bk = failure
                .record
                .as_ref()
                .and_then(|v| v.get(FIELD_BK_HASH))
                .and_then(Value::as_str);
            let raw = bk.and_then(|bk| by_bk.get(bk)).map(|r| r.raw.clone()).unwrap_or(Value::Null);
            failed_record_repository::create(
                self.pool, batch_uid, entity_name, &raw, None, failure.record.as_ref(),
                FailedStage::Ingest, "insert_error", &failure.error, FailedRecord::DEFAULT_MAX_RETRIES,
            )
            .await?;
            records_failed += 1;
        }

        let update_ops: Vec<UpdateOp> = final_update
            .iter()
            .filter_map(|r: &Record| {
                r.get("uid").and_then(Value::as_str).map(|uid| UpdateOp {
                    uid: uid.to_string(),
                    data: Value::Object(r.clone()),
                })
            })
            .collect();
        let update_result = self.sink.batch_update(entity_name, &update_ops).await?;
        for failure in &update_result.failures {
            let raw = failure
                .uid
                .as_deref()
                .and_then(|uid| update_raw_by_uid.get(uid))
                .cloned()
                .unwrap_or(Value::Null);
            failed_record_repository::create(
                self.pool, batch_uid, entity_name, &raw, None, None,
                FailedStage::Ingest, "update_error", &failure.error, FailedRecord::DEFAULT_MAX_RETRIES,
            )
            .await?;
            records_failed += 1;
        }

        let delete_uids: Vec<String> = delta_result.delete.iter().filter_map(|d| d.uid.clone()).collect();
        let delete_result = self.sink.batch_delete(entity_name, &delete_uids).await?;
        for failure in &delete_result.failures {
            let raw = failure.uid.as_deref().map(|uid| serde_json::json!({ "uid": uid })).unwrap_or(Value::Null);
            failed_record_repository::create(
                self.pool, batch_uid, entity_name, &raw, None, None,
                FailedStage::Ingest, "delete_error", &failure.error, FailedRecord::DEFAULT_MAX_RETRIES,
            )
            .await?;
            records_failed += 1;
        }

        info!("[stage 9/9] TRACK entity={entity_name}");

        let metrics = BatchMetrics {
            records_processed: raw_records.len() as i64,
            records_inserted: insert_result.success_count as i64,
            records_updated: update_result.success_count as i64,
            records_deleted: delete_result.success_count as i64,
            records_skipped: delta_result.skip.len() as i64 + pending_count,
            records_failed: records_failed
                + insert_result.failure_count as i64
                + update_result.failure_count as i64
                + delete_result.failure_count as i64,
        };

        Ok(RunSummary {
            metrics,
            max_rowversion,
            empty_fetch_message: None,
        })
    }

    async fn fetch(&self, request: &SyncRequest) -> SyncResult<Vec<Value>> {
        let mut filters = request.filters.clone().unwrap_or_else(|| Value::Object(Map::new()));

        if let Value::Object(map) = &mut filters {
            if request.sync_type == SyncType::Incremental {
                if let Some(state) =
                    sync_state_repository::get(self.pool, &request.entity_config.entity_name, &request.source_system)
                        .await?
                {
                    if let Some(rowversion) = state.last_sync_rowversion {
                        map.insert("row_version_gt".to_string(), Value::String(rowversion));
                    }
                }
            }
            if let Some(offset) = request.offset {
                map.insert("offset".to_string(), serde_json::json!(offset));
            }
            if let Some(limit) = request.limit {
                map.insert("limit".to_string(), serde_json::json!(limit));
            }
        }

        let filters = match &filters {
            Value::Object(map) if map.is_empty() => None,
            _ => Some(filters),
        };

        self.source
            .execute_all_pages(
                &request.entity_config.source_api_slug,
                request.page_size,
                filters,
                request.sort.clone(),
                request.max_pages,
            )
            .await
    }

    /// Replay one `FailedRecord` from its failed stage forward (§7's retry
    /// policy). `Ok(true)` means it now ingests cleanly (or is queued behind
    /// a still-missing parent); `Ok(false)` means it fails again and the
    /// caller should reschedule or, once retries are exhausted, give up on it.
    pub async fn retry_failed_record(
        &self,
        failed: &FailedRecord,
        entity_config: &EntityConfig,
        normalizer_config: &NormalizerConfig,
        extra_excluded_fields: &[String],
    ) -> SyncResult<bool> {
        let Some(mapped_record) = remap_failed_record(failed, normalizer_config) else {
            return Ok(false);
        };
        self.classify_and_ingest(entity_config, extra_excluded_fields, &failed.batch_uid, mapped_record)
            .await
    }

    /// Re-attempt ingest for one pending child whose parent has just been
    /// confirmed present (§4.4's retry protocol); `raw` is the child's
    /// originally fetched payload.
    pub async fn ingest_single(
        &self,
        batch_uid: &str,
        entity_config: &EntityConfig,
        normalizer_config: &NormalizerConfig,
        extra_excluded_fields: &[String],
        raw: &Value,
    ) -> SyncResult<bool> {
        let Some(source_record) = raw.as_object().cloned() else { return Ok(false) };
        let normalizer = Normalizer::new(normalizer_config);
        let (mapped_record, errors) = normalizer.normalize(&source_record);
        if !errors.is_empty() {
            return Ok(false);
        }
        self.classify_and_ingest(entity_config, extra_excluded_fields, batch_uid, mapped_record).await
    }

    /// Identity, parent-ref resolution, delta classification and ingest for
    /// one already-normalized record — the shared tail of both retry paths
    /// above, outside the context of a fetched batch.
    async fn classify_and_ingest(
        &self,
        entity_config: &EntityConfig,
        extra_excluded_fields: &[String],
        batch_uid: &str,
        mapped_record: Record,
    ) -> SyncResult<bool> {
        let entity_name = &entity_config.entity_name;
        let identity_engine = build_identity_engine(entity_config, extra_excluded_fields);
        let stamped = match identity_engine.add_identity(mapped_record) {
            Ok(stamped) => stamped,
            Err(_) => return Ok(false),
        };

        let refs = resolver::compute_parent_refs(&stamped, &entity_config.parent_refs_config);
        if !refs.is_empty() {
            let names = ordered_ref_names(&entity_config.parent_refs_config);
            if let resolver::ResolutionOutcome::Blocked { parent_entity, parent_bk_hash } =
                resolver::check_parents_exist(self.sink, &refs, &names).await?
            {
                resolver::queue_pending_child(
                    self.pool,
                    batch_uid,
                    entity_name,
                    &parent_entity,
                    &parent_bk_hash,
                    &Value::Object(stamped),
                )
                .await?;
                return Ok(true);
            }
        }

        let Some(bk) = stamped.get(FIELD_BK_HASH).and_then(Value::as_str).map(str::to_string) else {
            return Ok(false);
        };
        let sink_by_bk = self.sink.get_batch_by_bk_hashes(entity_name, std::slice::from_ref(&bk)).await?;
        let stored: Vec<StoredRecord> =
            sink_by_bk.iter().filter_map(|(bk, value)| stored_record_from_sink(bk, value)).collect();
        let delta_result = delta::classify(std::slice::from_ref(&stamped), &stored, DeltaStrategy::Auto, false);

        if let Some(delta_record) = delta_result.insert.into_iter().next() {
            let payload = Value::Object(delta_record.record);
            let result = self.sink.batch_insert(entity_name, std::slice::from_ref(&payload)).await?;
            return Ok(result.failure_count == 0);
        }
        if let Some(delta_record) = delta_result.update.into_iter().next() {
            let Some(uid) = delta_record.uid else { return Ok(false) };
            let op = UpdateOp { uid, data: Value::Object(delta_record.record) };
            let result = self.sink.batch_update(entity_name, std::slice::from_ref(&op)).await?;
            return Ok(result.failure_count == 0);
        }

        // SKIP: already in sync, nothing to ingest.
        Ok(true)
    }
}

fn build_identity_engine(entity_config: &EntityConfig, extra_excluded_fields: &[String]) -> IdentityEngine {
    let mut engine = IdentityEngine::new(entity_config.entity_name.clone(), entity_config.business_key_fields.clone())
        .with_extra_excluded_fields(extra_excluded_fields.to_vec());
    if let Some(field) = &entity_config.rowversion_field {
        engine = engine.with_rowversion_field(field.clone());
    }
    engine
}

fn route_by_operation(delta_record: delta::DeltaRecord, insert: &mut Vec<Record>, update: &mut Vec<Record>) {
    match delta_record.operation {
        delta::DeltaOperation::Insert => insert.push(delta_record.record),
        delta::DeltaOperation::Update => {
            let mut record = delta_record.record;
            if let Some(uid) = delta_record.uid {
                record.insert("uid".to_string(), Value::String(uid));
            }
            update.push(record);
        }
        delta::DeltaOperation::Skip | delta::DeltaOperation::Delete => {
            unreachable!("skip/delete records never reach the resolve stage")
        }
    }
}

fn ordered_ref_names(config: &HashMap<String, ParentRefConfig>) -> Vec<String> {
    let mut names: Vec<String> = config.keys().cloned().collect();
    names.sort();
    names
}

/// Re-derive the normalized record a `FailedRecord` should resume from: its
/// persisted `mapped_data` when the failure happened at or after identity,
/// otherwise a fresh normalize of `raw_data`. Returns `None` if normalize
/// still fails, meaning the retry should not proceed further.
fn remap_failed_record(failed: &FailedRecord, normalizer_config: &NormalizerConfig) -> Option<Record> {
    let renormalize = || {
        let source_record = failed.raw_data.as_object()?.clone();
        let normalizer = Normalizer::new(normalizer_config);
        let (mapped_record, errors) = normalizer.normalize(&source_record);
        errors.is_empty().then_some(mapped_record)
    };

    match failed.stage_failed {
        FailedStage::Normalize | FailedStage::Validate => renormalize(),
        FailedStage::Identity | FailedStage::Resolve | FailedStage::Ingest => match &failed.mapped_data {
            Some(Value::Object(map)) => Some(map.clone()),
            _ => renormalize(),
        },
    }
}

fn stored_record_from_sink(bk: &str, value: &Value) -> Option<StoredRecord> {
    let obj = value.as_object()?;
    let uid = obj.get("uid").and_then(Value::as_str)?.to_string();
    let data_hash = crate::model::record::data_hash(obj)?.to_string();
    let rowversion = crate::model::record::rowversion(obj).and_then(rowversion::extract);
    Some(StoredRecord {
        bk_hash: bk.to_string(),
        data_hash,
        rowversion,
        uid,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::record::{FIELD_DATA_HASH, FIELD_ROWVERSION};
    use serde_json::json;

    #[test]
    fn stored_record_from_sink_extracts_identity_fields() {
        let value = json!({
            "uid": "u1",
            FIELD_DATA_HASH: "dh1",
            FIELD_ROWVERSION: "5",
        });
        let stored = stored_record_from_sink("bk1", &value).unwrap();
        assert_eq!(stored.uid, "u1");
        assert_eq!(stored.data_hash, "dh1");
        assert_eq!(stored.rowversion.as_deref(), Some("5"));
    }

    #[test]
    fn stored_record_from_sink_none_without_uid() {
        let value = json!({ FIELD_DATA_HASH: "dh1" });
        assert!(stored_record_from_sink("bk1", &value).is_none());
    }

    #[test]
    fn build_identity_engine_wires_rowversion_field_when_configured() {
        let mut entity_config_base = sample_entity_config();
        entity_config_base.rowversion_field = Some("last_modified".to_string());
        let engine = build_identity_engine(&entity_config_base, &[]);
        assert_eq!(engine.rowversion_field.as_deref(), Some("last_modified"));
    }

    #[test]
    fn build_identity_engine_leaves_rowversion_unset_when_absent() {
        let engine = build_identity_engine(&sample_entity_config(), &[]);
        assert!(engine.rowversion_field.is_none());
    }

    #[test]
    fn ordered_ref_names_sorts_alphabetically() {
        let mut config = HashMap::new();
        config.insert("site".to_string(), sample_parent_ref());
        config.insert("customer".to_string(), sample_parent_ref());
        assert_eq!(ordered_ref_names(&config), vec!["customer".to_string(), "site".to_string()]);
    }

    #[test]
    fn remap_failed_record_renormalizes_from_raw_for_normalize_stage() {
        let failed = sample_failed_record(FailedStage::Normalize, json!({"item_id": "A"}), None);
        let mapped = remap_failed_record(&failed, &NormalizerConfig::default()).unwrap();
        assert_eq!(mapped.get("item_id").and_then(Value::as_str), Some("A"));
    }

    #[test]
    fn remap_failed_record_reuses_mapped_data_for_identity_stage() {
        let mapped_data = json!({"item_id": "A", "qty": 3});
        let failed = sample_failed_record(FailedStage::Identity, json!({}), Some(mapped_data.clone()));
        let mapped = remap_failed_record(&failed, &NormalizerConfig::default()).unwrap();
        assert_eq!(Value::Object(mapped), mapped_data);
    }

    #[test]
    fn remap_failed_record_falls_back_to_raw_when_mapped_data_missing() {
        let failed = sample_failed_record(FailedStage::Ingest, json!({"item_id": "B"}), None);
        let mapped = remap_failed_record(&failed, &NormalizerConfig::default()).unwrap();
        assert_eq!(mapped.get("item_id").and_then(Value::as_str), Some("B"));
    }

    fn sample_parent_ref() -> ParentRefConfig {
        ParentRefConfig {
            parent_entity: "sites".to_string(),
            parent_field: "site_id".to_string(),
            child_field: "site_ref".to_string(),
        }
    }

    fn sample_failed_record(stage: FailedStage, raw_data: Value, mapped_data: Option<Value>) -> FailedRecord {
        FailedRecord {
            uid: "f1".to_string(),
            batch_uid: "b1".to_string(),
            entity_name: "inventory_items".to_string(),
            raw_data,
            normalized_data: None,
            mapped_data,
            stage_failed: stage,
            error_type: "test".to_string(),
            error_message: "test failure".to_string(),
            retry_count: 0,
            max_retries: FailedRecord::DEFAULT_MAX_RETRIES,
            next_retry_at: None,
            resolved_at: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn sample_entity_config() -> EntityConfig {
        EntityConfig {
            uid: "u1".to_string(),
            entity_name: "inventory_items".to_string(),
            source_api_slug: "inv-api".to_string(),
            business_key_fields: vec!["item_id".to_string()],
            rowversion_field: None,
            sync_enabled: true,
            sync_schedule: None,
            parent_refs_config: HashMap::new(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }
}
