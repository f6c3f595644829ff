//! Entry point: loads configuration, opens the state store, builds the
//! source/sink clients, and registers every enabled entity's sync,
//! background-backfill, retry, and cleanup jobs on the scheduler before
//! parking the process on its timing loop.

use std::sync::Arc;

use log::{info, warn};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use syncflow_core::api;
use syncflow_core::config::Settings;
use syncflow_core::context::AppContext;
use syncflow_core::delta::DeltaStrategy;
use syncflow_core::error::SyncResult;
use syncflow_core::model::SyncType;
use syncflow_core::normalize::NormalizerConfig;
use syncflow_core::repository::{entity_config_repository, field_mapping_repository};
use syncflow_core::scheduler::jobs::{
    background_sync_job, cleanup_job, failed_record_retry_job, pending_children_retry_job, sync_job, EntityRegistration,
};
use syncflow_core::scheduler::SchedulerHandle;

const CLEANUP_RETENTION_DAYS: i64 = 90;
const RETRY_POLL_INTERVAL_SECS: u64 = 300;
const CLEANUP_INTERVAL_SECS: u64 = 24 * 60 * 60;

#[tokio::main]
async fn main() -> SyncResult<()> {
    let settings = Settings::from_env()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&settings.log_level)).init();
    info!("starting syncflow ({})", settings.app_env);

    let pool = connect(&settings).await?;
    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        syncflow_core::error::SyncError::configuration(format!("failed to run migrations: {e}"))
    })?;

    let (source, sink) = api::build_clients(&settings);
    let scheduler = SchedulerHandle::start();

    let registrations = load_registrations(&pool, &settings).await?;
    let ctx = Arc::new(AppContext::new(pool, source, sink, settings.clone(), scheduler.clone()));

    register_jobs(&ctx, &registrations, &settings).await;

    info!("syncflow running with {} registered entities", registrations.len());
    tokio::signal::ctrl_c().await.ok();
    info!("shutting down");
    ctx.scheduler.stop().await;
    Ok(())
}

async fn connect(settings: &Settings) -> SyncResult<SqlitePool> {
    let options = settings
        .database_url
        .parse::<SqliteConnectOptions>()
        .map_err(|e| syncflow_core::error::SyncError::configuration(format!("invalid DATABASE_URL: {e}")))?
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(settings.database_pool_size)
        .connect_with(options)
        .await
        .map_err(|e| syncflow_core::error::SyncError::connection(format!("failed to connect to state store: {e}")))
}

/// Build one `EntityRegistration` per enabled entity, pairing its persisted
/// `EntityConfig` with the field mappings also loaded from the state store.
/// Type coercion/numeric/datetime hints aren't persisted (they describe the
/// source shape, not sync bookkeeping) so they default empty; an entity that
/// needs them configures a dedicated `NormalizerConfig` outside this loop.
async fn load_registrations(pool: &SqlitePool, settings: &Settings) -> SyncResult<Vec<EntityRegistration>> {
    let mut registrations = Vec::new();

    for entity_config in entity_config_repository::list_enabled(pool).await? {
        let field_mappings = field_mapping_repository::list_for_entity(pool, &entity_config.entity_name).await?;
        if field_mappings.is_empty() {
            warn!("entity '{}' has no field mappings configured", entity_config.entity_name);
        }

        let normalizer_config = NormalizerConfig { field_mappings, ..NormalizerConfig::default() };
        let source_system = entity_config.source_api_slug.clone();

        registrations.push(EntityRegistration {
            entity_config,
            source_system,
            normalizer_config,
            extra_excluded_fields: Vec::new(),
            delta_strategy: DeltaStrategy::Auto,
            page_size: settings.default_batch_size.min(u32::MAX as usize) as u32,
            max_pages: None,
        });
    }

    Ok(registrations)
}

async fn register_jobs(ctx: &Arc<AppContext>, registrations: &[EntityRegistration], settings: &Settings) {
    let registrations_arc = Arc::new(registrations.to_vec());
    let window_start = parse_window(&settings.background_sync_window_start, (19, 0, 0));
    let window_end = parse_window(&settings.background_sync_window_end, (7, 0, 0));

    for registration in registrations {
        let entity_name = registration.entity_config.entity_name.clone();
        let registration = Arc::new(registration.clone());

        ctx.scheduler
            .add_sync_job(&entity_name, window_start, window_end, sync_job(ctx.clone(), registration.clone(), SyncType::Incremental))
            .await;

        if settings.background_sync_enabled {
            ctx.scheduler
                .add_sync_job(
                    &format!("{entity_name}:background"),
                    window_start,
                    window_end,
                    background_sync_job(ctx.clone(), registration.clone()),
                )
                .await;
        }
    }

    ctx.scheduler
        .add_interval_job(
            "failed-record-retry",
            std::time::Duration::from_secs(RETRY_POLL_INTERVAL_SECS),
            failed_record_retry_job(ctx.clone(), registrations_arc.clone()),
        )
        .await;

    ctx.scheduler
        .add_interval_job(
            "pending-children-retry",
            std::time::Duration::from_secs(RETRY_POLL_INTERVAL_SECS),
            pending_children_retry_job(ctx.clone(), registrations_arc.clone()),
        )
        .await;

    ctx.scheduler
        .add_interval_job(
            "cleanup",
            std::time::Duration::from_secs(CLEANUP_INTERVAL_SECS),
            cleanup_job(ctx.clone(), CLEANUP_RETENTION_DAYS, CLEANUP_RETENTION_DAYS),
        )
        .await;
}

fn parse_window(value: &str, fallback: (u32, u32, u32)) -> chrono::NaiveTime {
    chrono::NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| chrono::NaiveTime::parse_from_str(value, "%H:%M"))
        .unwrap_or_else(|_| chrono::NaiveTime::from_hms_opt(fallback.0, fallback.1, fallback.2).unwrap())
}
