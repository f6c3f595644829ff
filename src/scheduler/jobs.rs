//! Concrete job bodies the scheduler fires (§4.8), grounded on the
//! background-sync / failed-record-retry / pending-children-retry / cleanup
//! jobs of the system this crate replaces. Each builder closes over an
//! `Arc<AppContext>` plus the per-entity metadata in `EntityRegistration`
//! and returns a `JobFn` ready for `SchedulerHandle::add_*_job`.

use std::sync::Arc;

use chrono::{NaiveTime, Utc};
use log::{error, info, warn};

use crate::context::AppContext;
use crate::delta::DeltaStrategy;
use crate::error::SyncResult;
use crate::model::{EntityConfig, SyncType};
use crate::normalize::NormalizerConfig;
use crate::orchestrator::{Orchestrator, SyncRequest};
use crate::repository::{background_schedule_repository, batch_repository, failed_record_repository, pending_child_repository};
use crate::resolver;

use super::{next_daily_occurrence, JobFn};

/// Everything a job needs about one entity beyond what lives in the
/// `entity_config` table: the normalizer's field mappings describe the
/// source payload's shape rather than sync bookkeeping, so they're supplied
/// at registration time instead of loaded from a repository.
#[derive(Clone)]
pub struct EntityRegistration {
    pub entity_config: EntityConfig,
    pub source_system: String,
    pub normalizer_config: NormalizerConfig,
    pub extra_excluded_fields: Vec<String>,
    pub delta_strategy: DeltaStrategy,
    pub page_size: u32,
    pub max_pages: Option<u32>,
}

/// The regular full/incremental sync job for one entity.
pub fn sync_job(ctx: Arc<AppContext>, registration: Arc<EntityRegistration>, sync_type: SyncType) -> JobFn {
    Arc::new(move || {
        let ctx = ctx.clone();
        let registration = registration.clone();
        Box::pin(async move {
            let entity_name = registration.entity_config.entity_name.clone();
            let orchestrator = Orchestrator::new(&ctx.pool, &ctx.source, &ctx.sink);
            let request = SyncRequest {
                entity_config: registration.entity_config.clone(),
                source_system: registration.source_system.clone(),
                normalizer_config: registration.normalizer_config.clone(),
                extra_excluded_fields: registration.extra_excluded_fields.clone(),
                sync_type,
                page_size: registration.page_size,
                max_pages: registration.max_pages,
                delta_strategy: registration.delta_strategy,
                filters: None,
                sort: None,
                offset: None,
                limit: None,
            };
            match orchestrator.run(request).await {
                Ok(batch) => info!("sync job for '{entity_name}' finished: {:?}", batch.status),
                Err(err) => error!("sync job for '{entity_name}' failed: {err}"),
            }
        })
    })
}

/// The background-backfill job: advances one entity's multi-day sync by one
/// slice per run, tracked via its `background_sync_schedule` row.
pub fn background_sync_job(ctx: Arc<AppContext>, registration: Arc<EntityRegistration>) -> JobFn {
    Arc::new(move || {
        let ctx = ctx.clone();
        let registration = registration.clone();
        Box::pin(async move {
            if let Err(err) = run_background_sync(&ctx, &registration).await {
                error!("background sync job for '{}' failed: {err}", registration.entity_config.entity_name);
            }
        })
    })
}

async fn run_background_sync(ctx: &AppContext, registration: &EntityRegistration) -> SyncResult<()> {
    let entity_name = &registration.entity_config.entity_name;

    let Some(schedule) = background_schedule_repository::get(&ctx.pool, entity_name).await? else {
        warn!("no background schedule registered for '{entity_name}', skipping");
        return Ok(());
    };

    if !schedule.is_enabled {
        info!("background schedule disabled for '{entity_name}', skipping");
        return Ok(());
    }

    if schedule.is_complete() {
        info!("background sync already complete for '{entity_name}'");
        return Ok(());
    }

    let slice_size = schedule.next_slice_size(ctx.settings.default_batch_size as i64).max(1);

    let orchestrator = Orchestrator::new(&ctx.pool, &ctx.source, &ctx.sink);
    let request = SyncRequest {
        entity_config: registration.entity_config.clone(),
        source_system: registration.source_system.clone(),
        normalizer_config: registration.normalizer_config.clone(),
        extra_excluded_fields: registration.extra_excluded_fields.clone(),
        sync_type: SyncType::Background,
        page_size: registration.page_size,
        max_pages: registration.max_pages,
        delta_strategy: registration.delta_strategy,
        filters: None,
        sort: None,
        offset: Some(schedule.current_offset.max(0) as u64),
        limit: Some(slice_size as u64),
    };

    let batch = orchestrator.run(request).await?;
    let processed = batch.metrics.records_processed.max(0);

    let run_at = Utc::now().to_rfc3339();
    background_schedule_repository::advance_offset(&ctx.pool, &schedule.uid, processed, &run_at).await?;

    if let Ok(window_start) = parse_time(&schedule.sync_window_start) {
        let next_run_at = next_daily_occurrence(window_start).to_rfc3339();
        background_schedule_repository::set_next_run_at(&ctx.pool, &schedule.uid, Some(&next_run_at)).await?;
    }

    info!(
        "background sync advanced '{entity_name}' by {processed} rows (offset now {})",
        schedule.current_offset + processed
    );
    Ok(())
}

/// The failed-record retry job: replays each due `FailedRecord` from its
/// failed stage forward, resolving it or rescheduling with backoff.
pub fn failed_record_retry_job(ctx: Arc<AppContext>, registrations: Arc<Vec<EntityRegistration>>) -> JobFn {
    Arc::new(move || {
        let ctx = ctx.clone();
        let registrations = registrations.clone();
        Box::pin(async move {
            if let Err(err) = run_failed_record_retry(&ctx, &registrations).await {
                error!("failed record retry job failed: {err}");
            }
        })
    })
}

async fn run_failed_record_retry(ctx: &AppContext, registrations: &[EntityRegistration]) -> SyncResult<()> {
    let now = Utc::now().to_rfc3339();
    let due = failed_record_repository::list_due_for_retry(&ctx.pool, &now).await?;
    let max_batch = ctx.settings.max_batch_size;

    let mut resolved = 0u32;
    let mut rescheduled = 0u32;

    for failed in due.into_iter().take(max_batch) {
        let Some(registration) = registrations.iter().find(|r| r.entity_config.entity_name == failed.entity_name) else {
            warn!("no entity registration for failed record entity '{}', skipping", failed.entity_name);
            continue;
        };

        let orchestrator = Orchestrator::new(&ctx.pool, &ctx.source, &ctx.sink);
        let outcome = orchestrator
            .retry_failed_record(
                &failed,
                &registration.entity_config,
                &registration.normalizer_config,
                &registration.extra_excluded_fields,
            )
            .await;

        match outcome {
            Ok(true) => {
                failed_record_repository::mark_resolved(&ctx.pool, &failed.uid).await?;
                resolved += 1;
            }
            Ok(false) | Err(_) => {
                let next_retry_at = resolver::backoff_at(
                    ctx.settings.retry_delay_seconds as i64,
                    ctx.settings.max_retry_delay_seconds as i64,
                    failed.retry_count,
                );
                failed_record_repository::schedule_retry(&ctx.pool, &failed.uid, &next_retry_at).await?;
                rescheduled += 1;
            }
        }
    }

    info!("failed record retry: {resolved} resolved, {rescheduled} rescheduled");
    Ok(())
}

/// The pending-children retry job: re-checks each due child's parent and
/// either ingests it, reschedules it, or (once retries are exhausted) moves
/// it into `failed_records` (handled inside `resolver::retry_due_children`).
pub fn pending_children_retry_job(ctx: Arc<AppContext>, registrations: Arc<Vec<EntityRegistration>>) -> JobFn {
    Arc::new(move || {
        let ctx = ctx.clone();
        let registrations = registrations.clone();
        Box::pin(async move {
            let summary = resolver::retry_due_children(
                &ctx.pool,
                &ctx.sink,
                ctx.settings.retry_delay_seconds as i64,
                ctx.settings.max_retry_delay_seconds as i64,
                |child| {
                    let ctx = ctx.clone();
                    let registration =
                        registrations.iter().find(|r| r.entity_config.entity_name == child.child_entity).cloned();
                    let batch_uid = child.batch_uid.clone();
                    let child_payload = child.child_payload.clone();
                    async move {
                        let Some(registration) = registration else {
                            return Ok(false);
                        };
                        let orchestrator = Orchestrator::new(&ctx.pool, &ctx.source, &ctx.sink);
                        orchestrator
                            .ingest_single(
                                &batch_uid,
                                &registration.entity_config,
                                &registration.normalizer_config,
                                &registration.extra_excluded_fields,
                                &child_payload,
                            )
                            .await
                    }
                },
            )
            .await;

            match summary {
                Ok(summary) => info!(
                    "pending children retry: {} resolved, {} rescheduled, {} moved to failed",
                    summary.resolved, summary.rescheduled, summary.moved_to_failed
                ),
                Err(err) => error!("pending children retry job failed: {err}"),
            }
        })
    })
}

/// The cleanup job: prunes old completed batches, resolved failed records,
/// and resolved pending children past their retention windows.
pub fn cleanup_job(ctx: Arc<AppContext>, batch_retention_days: i64, failed_retention_days: i64) -> JobFn {
    Arc::new(move || {
        let ctx = ctx.clone();
        Box::pin(async move {
            match batch_repository::delete_old_batches(&ctx.pool, batch_retention_days).await {
                Ok(count) => info!("cleanup: deleted {count} old batches"),
                Err(err) => error!("cleanup job failed to delete old batches: {err}"),
            }
            match failed_record_repository::delete_old(&ctx.pool, failed_retention_days).await {
                Ok(count) => info!("cleanup: deleted {count} old failed records"),
                Err(err) => error!("cleanup job failed to delete old failed records: {err}"),
            }
            match pending_child_repository::cleanup_resolved(&ctx.pool, failed_retention_days).await {
                Ok(count) => info!("cleanup: deleted {count} resolved pending children"),
                Err(err) => error!("cleanup job failed to delete resolved pending children: {err}"),
            }
        })
    })
}

/// Parse `"HH:MM:SS"` or `"HH:MM"` into a `NaiveTime`.
fn parse_time(value: &str) -> SyncResult<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|e| crate::error::SyncError::configuration(format!("invalid time '{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_time_accepts_hh_mm_ss_and_hh_mm() {
        assert_eq!(parse_time("19:00:00").unwrap(), NaiveTime::from_hms_opt(19, 0, 0).unwrap());
        assert_eq!(parse_time("07:30").unwrap(), NaiveTime::from_hms_opt(7, 30, 0).unwrap());
    }

    #[test]
    fn parse_time_rejects_garbage() {
        assert!(parse_time("not-a-time").is_err());
    }
}
