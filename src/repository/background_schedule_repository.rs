//! Background backfill schedule repository (§4.8, §11): per-entity windowed
//! multi-day sync progress, driven by the scheduler's daily job.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::SyncResult;
use crate::model::BackgroundSchedule;

pub async fn create(
    pool: &SqlitePool,
    entity_name: &str,
    source_system: &str,
    sync_window_start: &str,
    sync_window_end: &str,
    days_to_complete: Option<i64>,
    rows_per_day: Option<i64>,
    total_rows_estimate: Option<i64>,
) -> SyncResult<BackgroundSchedule> {
    let uid = Uuid::now_v7().to_string();

    sqlx::query(
        "INSERT INTO background_sync_schedule (
            uid, entity_name, source_system, is_enabled, sync_window_start, sync_window_end,
            days_to_complete, rows_per_day, total_rows_estimate, current_offset, last_run_at, next_run_at
        ) VALUES (?, ?, ?, 1, ?, ?, ?, ?, ?, 0, NULL, NULL)",
    )
    .bind(&uid)
    .bind(entity_name)
    .bind(source_system)
    .bind(sync_window_start)
    .bind(sync_window_end)
    .bind(days_to_complete)
    .bind(rows_per_day)
    .bind(total_rows_estimate)
    .execute(pool)
    .await?;

    Ok(BackgroundSchedule {
        uid,
        entity_name: entity_name.to_string(),
        source_system: source_system.to_string(),
        is_enabled: true,
        sync_window_start: sync_window_start.to_string(),
        sync_window_end: sync_window_end.to_string(),
        days_to_complete,
        rows_per_day,
        total_rows_estimate,
        current_offset: 0,
        last_run_at: None,
        next_run_at: None,
    })
}

pub async fn get(pool: &SqlitePool, entity_name: &str) -> SyncResult<Option<BackgroundSchedule>> {
    let row: Option<BackgroundScheduleRow> = sqlx::query_as(
        "SELECT uid, entity_name, source_system, is_enabled, sync_window_start, sync_window_end,
                days_to_complete, rows_per_day, total_rows_estimate, current_offset, last_run_at, next_run_at
         FROM background_sync_schedule WHERE entity_name = ?",
    )
    .bind(entity_name)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(BackgroundScheduleRow::into_model))
}

pub async fn list_enabled(pool: &SqlitePool) -> SyncResult<Vec<BackgroundSchedule>> {
    let rows: Vec<BackgroundScheduleRow> = sqlx::query_as(
        "SELECT uid, entity_name, source_system, is_enabled, sync_window_start, sync_window_end,
                days_to_complete, rows_per_day, total_rows_estimate, current_offset, last_run_at, next_run_at
         FROM background_sync_schedule WHERE is_enabled = 1",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(BackgroundScheduleRow::into_model).collect())
}

pub async fn advance_offset(pool: &SqlitePool, uid: &str, rows_fetched: i64, run_at: &str) -> SyncResult<()> {
    sqlx::query(
        "UPDATE background_sync_schedule
         SET current_offset = current_offset + ?, last_run_at = ?
         WHERE uid = ?",
    )
    .bind(rows_fetched)
    .bind(run_at)
    .bind(uid)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_next_run_at(pool: &SqlitePool, uid: &str, next_run_at: Option<&str>) -> SyncResult<()> {
    sqlx::query("UPDATE background_sync_schedule SET next_run_at = ? WHERE uid = ?")
        .bind(next_run_at)
        .bind(uid)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_enabled(pool: &SqlitePool, entity_name: &str, is_enabled: bool) -> SyncResult<()> {
    sqlx::query("UPDATE background_sync_schedule SET is_enabled = ? WHERE entity_name = ?")
        .bind(is_enabled)
        .bind(entity_name)
        .execute(pool)
        .await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct BackgroundScheduleRow {
    uid: String,
    entity_name: String,
    source_system: String,
    is_enabled: bool,
    sync_window_start: String,
    sync_window_end: String,
    days_to_complete: Option<i64>,
    rows_per_day: Option<i64>,
    total_rows_estimate: Option<i64>,
    current_offset: i64,
    last_run_at: Option<String>,
    next_run_at: Option<String>,
}

impl BackgroundScheduleRow {
    fn into_model(self) -> BackgroundSchedule {
        BackgroundSchedule {
            uid: self.uid,
            entity_name: self.entity_name,
            source_system: self.source_system,
            is_enabled: self.is_enabled,
            sync_window_start: self.sync_window_start,
            sync_window_end: self.sync_window_end,
            days_to_complete: self.days_to_complete,
            rows_per_day: self.rows_per_day,
            total_rows_estimate: self.total_rows_estimate,
            current_offset: self.current_offset,
            last_run_at: self.last_run_at,
            next_run_at: self.next_run_at,
        }
    }
}
