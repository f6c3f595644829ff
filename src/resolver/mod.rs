//! Parent-Child Resolver (§4.4): computes `parent_refs` for incoming child
//! records, checks parent existence against the sink, and queues children
//! whose parents are not yet synced.

use std::collections::HashMap;

use chrono::Utc;
use log::{info, warn};
use serde_json::Value;
use sqlx::SqlitePool;

use crate::api::SinkClient;
use crate::error::SyncResult;
use crate::identity::bk_hash;
use crate::model::{FailedStage, ParentRefConfig, PendingChild, Record};
use crate::repository::pending_child_repository;

/// One resolved parent reference: the BK this child computes for a
/// declared parent, and whether that BK was found in the sink.
#[derive(Debug, Clone)]
pub struct ResolvedParentRef {
    pub parent_entity: String,
    pub parent_bk_hash: Option<String>,
}

/// Compute `parent_refs` for one record per the declared config (§4.4
/// detection). A reference whose `child_field` is null yields a `None`
/// entry rather than being omitted; an incomplete config entry is skipped
/// with a warning.
pub fn compute_parent_refs(
    record: &Record,
    parent_refs_config: &HashMap<String, ParentRefConfig>,
) -> HashMap<String, ResolvedParentRef> {
    let mut refs = HashMap::new();

    for (ref_name, cfg) in parent_refs_config {
        if cfg.parent_entity.is_empty() || cfg.parent_field.is_empty() || cfg.child_field.is_empty() {
            warn!("parent ref '{ref_name}' has an incomplete config, skipping");
            continue;
        }

        let child_value = record.get(&cfg.child_field);
        let bk = match child_value {
            Some(Value::Null) | None => None,
            Some(value) => {
                let mut key_record = Record::new();
                key_record.insert(cfg.parent_field.clone(), value.clone());
                let fields = [cfg.parent_field.clone()];
                match bk_hash::generate(&key_record, &fields, Some(&cfg.parent_entity)) {
                    Ok(hash) => Some(hash),
                    Err(_) => None,
                }
            }
        };

        refs.insert(
            ref_name.clone(),
            ResolvedParentRef {
                parent_entity: cfg.parent_entity.clone(),
                parent_bk_hash: bk,
            },
        );
    }

    refs
}

/// Outcome of checking one record's resolved parent refs against the sink.
pub enum ResolutionOutcome {
    /// All declared parents exist (or the record has none) — safe to ingest.
    Resolved,
    /// The first absent parent encountered, in `parent_refs_config`'s
    /// declared order (`HashMap` iteration order is not itself meaningful,
    /// so callers that care about determinism should pass an ordered list).
    Blocked { parent_entity: String, parent_bk_hash: String },
}

/// Check a record's resolved parent refs against the sink, in the order
/// `ordered_ref_names` gives (normally the entity config's declared order).
pub async fn check_parents_exist(
    sink: &SinkClient,
    refs: &HashMap<String, ResolvedParentRef>,
    ordered_ref_names: &[String],
) -> SyncResult<ResolutionOutcome> {
    for ref_name in ordered_ref_names {
        let Some(resolved) = refs.get(ref_name) else { continue };
        let Some(bk) = &resolved.parent_bk_hash else { continue };

        if !sink.parent_exists(&resolved.parent_entity, bk).await? {
            return Ok(ResolutionOutcome::Blocked {
                parent_entity: resolved.parent_entity.clone(),
                parent_bk_hash: bk.clone(),
            });
        }
    }

    Ok(ResolutionOutcome::Resolved)
}

/// Queue a child whose parent was not found, per §4.4's queue semantics.
pub async fn queue_pending_child(
    pool: &SqlitePool,
    batch_uid: &str,
    child_entity: &str,
    parent_entity: &str,
    parent_bk_hash: &str,
    child_payload: &Value,
) -> SyncResult<()> {
    info!("queuing pending child: {child_entity} (waiting for {parent_entity}/{parent_bk_hash})");
    pending_child_repository::create(
        pool,
        batch_uid,
        child_entity,
        parent_entity,
        parent_bk_hash,
        child_payload,
        crate::model::PendingChild::DEFAULT_MAX_RETRIES,
    )
    .await?;
    Ok(())
}

/// Retry protocol (§4.4): re-check each due pending child's parent, either
/// resolving it (caller ingests and deletes the row) or rescheduling with
/// exponential backoff, or — once retries are exhausted — moving it to
/// `failed_records` and deleting the pending row in the same transaction.
///
/// `base_delay`/`max_delay` mirror `RetryConfig` (§10). `try_ingest` is the
/// caller-supplied attempt to actually sync the child once its parent is
/// confirmed present — it receives the whole pending-child row (not just the
/// payload) since the caller needs `child_entity`/`batch_uid` to pick the
/// right entity config and pipeline context; returning `Ok(true)` means the
/// child was ingested.
pub async fn retry_due_children<F, Fut>(
    pool: &SqlitePool,
    sink: &SinkClient,
    base_delay_secs: i64,
    max_delay_secs: i64,
    mut try_ingest: F,
) -> SyncResult<RetrySummary>
where
    F: FnMut(&PendingChild) -> Fut,
    Fut: std::future::Future<Output = SyncResult<bool>>,
{
    let now = Utc::now().to_rfc3339();
    let due = pending_child_repository::list_due_for_retry(pool, &now).await?;

    let mut summary = RetrySummary::default();

    for child in due {
        let parent_exists = sink.parent_exists(&child.parent_entity, &child.parent_bk_hash).await?;

        if !parent_exists {
            let next_retry_at = backoff_at(base_delay_secs, max_delay_secs, child.retry_count);
            pending_child_repository::schedule_retry(pool, &child.uid, &next_retry_at).await?;
            summary.rescheduled += 1;
            continue;
        }

        match try_ingest(&child).await {
            Ok(true) => {
                pending_child_repository::mark_resolved(pool, &child.uid).await?;
                summary.resolved += 1;
            }
            Ok(false) | Err(_) => {
                let next_retry_at = backoff_at(base_delay_secs, max_delay_secs, child.retry_count);
                pending_child_repository::schedule_retry(pool, &child.uid, &next_retry_at).await?;
                summary.rescheduled += 1;
            }
        }
    }

    for exhausted in pending_child_repository::list_exhausted(pool).await? {
        let mut tx = pool.begin().await?;

        let uid = uuid::Uuid::now_v7().to_string();
        sqlx::query(
            "INSERT INTO failed_records (
                uid, batch_uid, entity_name, raw_data, normalized_data, mapped_data,
                stage_failed, error_type, error_message, retry_count, max_retries,
                next_retry_at, resolved_at, created_at
            ) VALUES (?, ?, ?, ?, NULL, NULL, ?, ?, ?, ?, ?, NULL, NULL, ?)",
        )
        .bind(&uid)
        .bind(&exhausted.batch_uid)
        .bind(&exhausted.child_entity)
        .bind(serde_json::to_string(&exhausted.child_payload)?)
        .bind(FailedStage::Resolve.label())
        .bind("parent_child_resolution")
        .bind(format!(
            "parent {} ({}) never became available after {} retries",
            exhausted.parent_entity, exhausted.parent_bk_hash, exhausted.retry_count
        ))
        .bind(exhausted.retry_count)
        .bind(exhausted.max_retries)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM pending_children WHERE uid = ?")
            .bind(&exhausted.uid)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        summary.moved_to_failed += 1;
    }

    Ok(summary)
}

pub(crate) fn backoff_at(base_delay_secs: i64, max_delay_secs: i64, retry_count: i64) -> String {
    let delay = base_delay_secs.saturating_mul(1i64 << retry_count.min(32)).min(max_delay_secs);
    (Utc::now() + chrono::Duration::seconds(delay)).to_rfc3339()
}

#[derive(Debug, Default)]
pub struct RetrySummary {
    pub resolved: u32,
    pub rescheduled: u32,
    pub moved_to_failed: u32,
}
