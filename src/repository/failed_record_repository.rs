//! Dead-letter queue repository: records that fell out of the pipeline at
//! some stage, kept for inspection and bounded retry (§4.4, §11).

use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::SyncResult;
use crate::model::{FailedRecord, FailedStage};

pub async fn create(
    pool: &SqlitePool,
    batch_uid: &str,
    entity_name: &str,
    raw_data: &Value,
    normalized_data: Option<&Value>,
    mapped_data: Option<&Value>,
    stage_failed: FailedStage,
    error_type: &str,
    error_message: &str,
    max_retries: i64,
) -> SyncResult<FailedRecord> {
    let uid = Uuid::now_v7().to_string();
    let created_at = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO failed_records (
            uid, batch_uid, entity_name, raw_data, normalized_data, mapped_data,
            stage_failed, error_type, error_message, retry_count, max_retries,
            next_retry_at, resolved_at, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, NULL, NULL, ?)",
    )
    .bind(&uid)
    .bind(batch_uid)
    .bind(entity_name)
    .bind(serde_json::to_string(raw_data)?)
    .bind(normalized_data.map(serde_json::to_string).transpose()?)
    .bind(mapped_data.map(serde_json::to_string).transpose()?)
    .bind(stage_failed.label())
    .bind(error_type)
    .bind(error_message)
    .bind(max_retries)
    .bind(&created_at)
    .execute(pool)
    .await?;

    Ok(FailedRecord {
        uid,
        batch_uid: batch_uid.to_string(),
        entity_name: entity_name.to_string(),
        raw_data: raw_data.clone(),
        normalized_data: normalized_data.cloned(),
        mapped_data: mapped_data.cloned(),
        stage_failed,
        error_type: error_type.to_string(),
        error_message: error_message.to_string(),
        retry_count: 0,
        max_retries,
        next_retry_at: None,
        resolved_at: None,
        created_at,
    })
}

pub async fn get(pool: &SqlitePool, uid: &str) -> SyncResult<Option<FailedRecord>> {
    let row: Option<FailedRecordRow> = sqlx::query_as(SELECT_COLUMNS_WHERE_UID)
        .bind(uid)
        .fetch_optional(pool)
        .await?;
    row.map(FailedRecordRow::into_model).transpose()
}

/// Records due for a retry attempt: unresolved, under their retry ceiling,
/// and either never scheduled or past their `next_retry_at`.
pub async fn list_due_for_retry(pool: &SqlitePool, now: &str) -> SyncResult<Vec<FailedRecord>> {
    let rows: Vec<FailedRecordRow> = sqlx::query_as(
        "SELECT uid, batch_uid, entity_name, raw_data, normalized_data, mapped_data,
                stage_failed, error_type, error_message, retry_count, max_retries,
                next_retry_at, resolved_at, created_at
         FROM failed_records
         WHERE resolved_at IS NULL AND retry_count < max_retries
           AND (next_retry_at IS NULL OR next_retry_at <= ?)
         ORDER BY created_at ASC",
    )
    .bind(now)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(FailedRecordRow::into_model).collect()
}

pub async fn list_unresolved(pool: &SqlitePool, entity_name: &str) -> SyncResult<Vec<FailedRecord>> {
    let rows: Vec<FailedRecordRow> = sqlx::query_as(
        "SELECT uid, batch_uid, entity_name, raw_data, normalized_data, mapped_data,
                stage_failed, error_type, error_message, retry_count, max_retries,
                next_retry_at, resolved_at, created_at
         FROM failed_records WHERE entity_name = ? AND resolved_at IS NULL
         ORDER BY created_at ASC",
    )
    .bind(entity_name)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(FailedRecordRow::into_model).collect()
}

pub async fn schedule_retry(pool: &SqlitePool, uid: &str, next_retry_at: &str) -> SyncResult<()> {
    sqlx::query("UPDATE failed_records SET retry_count = retry_count + 1, next_retry_at = ? WHERE uid = ?")
        .bind(next_retry_at)
        .bind(uid)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_resolved(pool: &SqlitePool, uid: &str) -> SyncResult<()> {
    sqlx::query("UPDATE failed_records SET resolved_at = ? WHERE uid = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(uid)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_old(pool: &SqlitePool, days_old: i64) -> SyncResult<u64> {
    let cutoff = (Utc::now() - chrono::Duration::days(days_old)).to_rfc3339();
    let result = sqlx::query("DELETE FROM failed_records WHERE resolved_at IS NOT NULL AND resolved_at < ?")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

const SELECT_COLUMNS_WHERE_UID: &str = "SELECT uid, batch_uid, entity_name, raw_data, normalized_data, mapped_data,
                stage_failed, error_type, error_message, retry_count, max_retries,
                next_retry_at, resolved_at, created_at
         FROM failed_records WHERE uid = ?";

#[derive(sqlx::FromRow)]
struct FailedRecordRow {
    uid: String,
    batch_uid: String,
    entity_name: String,
    raw_data: String,
    normalized_data: Option<String>,
    mapped_data: Option<String>,
    stage_failed: String,
    error_type: String,
    error_message: String,
    retry_count: i64,
    max_retries: i64,
    next_retry_at: Option<String>,
    resolved_at: Option<String>,
    created_at: String,
}

impl FailedRecordRow {
    fn into_model(self) -> SyncResult<FailedRecord> {
        Ok(FailedRecord {
            uid: self.uid,
            batch_uid: self.batch_uid,
            entity_name: self.entity_name,
            raw_data: serde_json::from_str(&self.raw_data)?,
            normalized_data: self.normalized_data.as_deref().map(serde_json::from_str).transpose()?,
            mapped_data: self.mapped_data.as_deref().map(serde_json::from_str).transpose()?,
            stage_failed: FailedStage::from_label(&self.stage_failed).unwrap_or(FailedStage::Ingest),
            error_type: self.error_type,
            error_message: self.error_message,
            retry_count: self.retry_count,
            max_retries: self.max_retries,
            next_retry_at: self.next_retry_at,
            resolved_at: self.resolved_at,
            created_at: self.created_at,
        })
    }
}
