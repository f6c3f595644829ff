//! Sync-batch repository: one row per orchestrator run, created at FETCH and
//! updated as the pipeline progresses through its stages (§4.5, §11).

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::SyncResult;
use crate::model::{BatchMetrics, BatchStatus, SyncBatch, SyncType};

pub async fn create_batch(
    pool: &SqlitePool,
    entity_name: &str,
    sync_type: SyncType,
    source_system: Option<&str>,
    source_api_slug: Option<&str>,
) -> SyncResult<SyncBatch> {
    let uid = Uuid::now_v7().to_string();
    let created_at = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO sync_batches (
            uid, entity_name, sync_type, source_system, status, total_records,
            records_processed, records_inserted, records_updated, records_deleted,
            records_skipped, records_failed, source_api_slug, last_rowversion,
            error_message, started_at, completed_at, created_at
        ) VALUES (?, ?, ?, ?, ?, 0, 0, 0, 0, 0, 0, 0, ?, NULL, NULL, NULL, NULL, ?)",
    )
    .bind(&uid)
    .bind(entity_name)
    .bind(sync_type.label())
    .bind(source_system)
    .bind(BatchStatus::Pending.label())
    .bind(source_api_slug)
    .bind(&created_at)
    .execute(pool)
    .await?;

    Ok(SyncBatch {
        uid,
        entity_name: entity_name.to_string(),
        sync_type,
        source_system: source_system.map(str::to_string),
        source_api_slug: source_api_slug.map(str::to_string),
        status: BatchStatus::Pending,
        total_records: 0,
        metrics: BatchMetrics::default(),
        last_rowversion: None,
        error_message: None,
        started_at: None,
        completed_at: None,
        created_at,
    })
}

pub async fn get_batch(pool: &SqlitePool, uid: &str) -> SyncResult<Option<SyncBatch>> {
    let row: Option<BatchRow> = sqlx::query_as(
        "SELECT uid, entity_name, sync_type, source_system, status, total_records,
                records_processed, records_inserted, records_updated, records_deleted,
                records_skipped, records_failed, source_api_slug, last_rowversion,
                error_message, started_at, completed_at, created_at
         FROM sync_batches WHERE uid = ?",
    )
    .bind(uid)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(BatchRow::into_model))
}

pub async fn get_latest_batch(pool: &SqlitePool, entity_name: &str) -> SyncResult<Option<SyncBatch>> {
    let row: Option<BatchRow> = sqlx::query_as(
        "SELECT uid, entity_name, sync_type, source_system, status, total_records,
                records_processed, records_inserted, records_updated, records_deleted,
                records_skipped, records_failed, source_api_slug, last_rowversion,
                error_message, started_at, completed_at, created_at
         FROM sync_batches WHERE entity_name = ? ORDER BY created_at DESC LIMIT 1",
    )
    .bind(entity_name)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(BatchRow::into_model))
}

pub async fn list_batches(
    pool: &SqlitePool,
    entity_name: Option<&str>,
    limit: i64,
) -> SyncResult<Vec<SyncBatch>> {
    let rows: Vec<BatchRow> = match entity_name {
        Some(name) => {
            sqlx::query_as(
                "SELECT uid, entity_name, sync_type, source_system, status, total_records,
                        records_processed, records_inserted, records_updated, records_deleted,
                        records_skipped, records_failed, source_api_slug, last_rowversion,
                        error_message, started_at, completed_at, created_at
                 FROM sync_batches WHERE entity_name = ? ORDER BY created_at DESC LIMIT ?",
            )
            .bind(name)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as(
                "SELECT uid, entity_name, sync_type, source_system, status, total_records,
                        records_processed, records_inserted, records_updated, records_deleted,
                        records_skipped, records_failed, source_api_slug, last_rowversion,
                        error_message, started_at, completed_at, created_at
                 FROM sync_batches ORDER BY created_at DESC LIMIT ?",
            )
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
    };

    Ok(rows.into_iter().map(BatchRow::into_model).collect())
}

pub async fn mark_started(pool: &SqlitePool, uid: &str, total_records: i64) -> SyncResult<()> {
    sqlx::query(
        "UPDATE sync_batches SET status = ?, total_records = ?, started_at = ? WHERE uid = ?",
    )
    .bind(BatchStatus::Running.label())
    .bind(total_records)
    .bind(Utc::now().to_rfc3339())
    .bind(uid)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_status(
    pool: &SqlitePool,
    uid: &str,
    status: BatchStatus,
    error_message: Option<&str>,
) -> SyncResult<()> {
    let completed_at = matches!(
        status,
        BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Cancelled
    )
    .then(|| Utc::now().to_rfc3339());

    sqlx::query(
        "UPDATE sync_batches SET status = ?, error_message = ?, completed_at = COALESCE(?, completed_at) WHERE uid = ?",
    )
    .bind(status.label())
    .bind(error_message)
    .bind(completed_at)
    .bind(uid)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_metrics(pool: &SqlitePool, uid: &str, metrics: &BatchMetrics) -> SyncResult<()> {
    sqlx::query(
        "UPDATE sync_batches SET
            records_processed = ?, records_inserted = ?, records_updated = ?,
            records_deleted = ?, records_skipped = ?, records_failed = ?
         WHERE uid = ?",
    )
    .bind(metrics.records_processed)
    .bind(metrics.records_inserted)
    .bind(metrics.records_updated)
    .bind(metrics.records_deleted)
    .bind(metrics.records_skipped)
    .bind(metrics.records_failed)
    .bind(uid)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_last_rowversion(pool: &SqlitePool, uid: &str, rowversion: &str) -> SyncResult<()> {
    sqlx::query("UPDATE sync_batches SET last_rowversion = ? WHERE uid = ?")
        .bind(rowversion)
        .bind(uid)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete batches (and their cascading `failed_records`/`pending_children` rows)
/// older than `days_old`. Returns the number of batches removed.
pub async fn delete_old_batches(pool: &SqlitePool, days_old: i64) -> SyncResult<u64> {
    let cutoff = (Utc::now() - chrono::Duration::days(days_old)).to_rfc3339();
    let result = sqlx::query("DELETE FROM sync_batches WHERE created_at < ? AND status IN ('completed', 'failed', 'cancelled')")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[derive(Debug, Default, sqlx::FromRow)]
pub struct BatchStatistics {
    pub total_batches: i64,
    pub completed_batches: i64,
    pub failed_batches: i64,
    pub total_records_processed: i64,
}

pub async fn get_batch_statistics(pool: &SqlitePool, entity_name: &str) -> SyncResult<BatchStatistics> {
    let stats: BatchStatistics = sqlx::query_as(
        "SELECT
            COUNT(*) AS total_batches,
            COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0) AS completed_batches,
            COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0) AS failed_batches,
            COALESCE(SUM(records_processed), 0) AS total_records_processed
         FROM sync_batches WHERE entity_name = ?",
    )
    .bind(entity_name)
    .fetch_one(pool)
    .await?;

    Ok(stats)
}

#[derive(sqlx::FromRow)]
struct BatchRow {
    uid: String,
    entity_name: String,
    sync_type: String,
    source_system: Option<String>,
    status: String,
    total_records: i64,
    records_processed: i64,
    records_inserted: i64,
    records_updated: i64,
    records_deleted: i64,
    records_skipped: i64,
    records_failed: i64,
    source_api_slug: Option<String>,
    last_rowversion: Option<String>,
    error_message: Option<String>,
    started_at: Option<String>,
    completed_at: Option<String>,
    created_at: String,
}

impl BatchRow {
    fn into_model(self) -> SyncBatch {
        SyncBatch {
            uid: self.uid,
            entity_name: self.entity_name,
            sync_type: SyncType::from_label(&self.sync_type).unwrap_or(SyncType::Incremental),
            source_system: self.source_system,
            source_api_slug: self.source_api_slug,
            status: BatchStatus::from_label(&self.status).unwrap_or(BatchStatus::Failed),
            total_records: self.total_records,
            metrics: BatchMetrics {
                records_processed: self.records_processed,
                records_inserted: self.records_inserted,
                records_updated: self.records_updated,
                records_deleted: self.records_deleted,
                records_skipped: self.records_skipped,
                records_failed: self.records_failed,
            },
            last_rowversion: self.last_rowversion,
            error_message: self.error_message,
            started_at: self.started_at,
            completed_at: self.completed_at,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let pool = pool().await;
        let batch = create_batch(&pool, "inventory_items", SyncType::Incremental, Some("erp"), Some("inv-api"))
            .await
            .unwrap();

        let fetched = get_batch(&pool, &batch.uid).await.unwrap().unwrap();
        assert_eq!(fetched.entity_name, "inventory_items");
        assert_eq!(fetched.status, BatchStatus::Pending);
        assert_eq!(fetched.sync_type, SyncType::Incremental);
    }

    #[tokio::test]
    async fn mark_started_then_complete_updates_status_and_timestamps() {
        let pool = pool().await;
        let batch = create_batch(&pool, "orders", SyncType::Full, None, None).await.unwrap();

        mark_started(&pool, &batch.uid, 500).await.unwrap();
        let running = get_batch(&pool, &batch.uid).await.unwrap().unwrap();
        assert_eq!(running.status, BatchStatus::Running);
        assert_eq!(running.total_records, 500);
        assert!(running.started_at.is_some());

        update_status(&pool, &batch.uid, BatchStatus::Completed, None).await.unwrap();
        let completed = get_batch(&pool, &batch.uid).await.unwrap().unwrap();
        assert_eq!(completed.status, BatchStatus::Completed);
        assert!(completed.completed_at.is_some());
    }

    #[tokio::test]
    async fn get_latest_batch_returns_most_recently_created() {
        let pool = pool().await;
        create_batch(&pool, "orders", SyncType::Full, None, None).await.unwrap();
        let second = create_batch(&pool, "orders", SyncType::Incremental, None, None).await.unwrap();

        let latest = get_latest_batch(&pool, "orders").await.unwrap().unwrap();
        assert_eq!(latest.uid, second.uid);
    }

    #[tokio::test]
    async fn update_metrics_persists_all_counters() {
        let pool = pool().await;
        let batch = create_batch(&pool, "orders", SyncType::Full, None, None).await.unwrap();

        let metrics = BatchMetrics {
            records_processed: 100,
            records_inserted: 40,
            records_updated: 50,
            records_deleted: 5,
            records_skipped: 3,
            records_failed: 2,
        };
        update_metrics(&pool, &batch.uid, &metrics).await.unwrap();

        let fetched = get_batch(&pool, &batch.uid).await.unwrap().unwrap();
        assert_eq!(fetched.metrics.records_inserted, 40);
        assert_eq!(fetched.metrics.records_failed, 2);
    }

    #[tokio::test]
    async fn get_batch_statistics_aggregates_across_batches() {
        let pool = pool().await;
        let a = create_batch(&pool, "orders", SyncType::Full, None, None).await.unwrap();
        let b = create_batch(&pool, "orders", SyncType::Full, None, None).await.unwrap();
        update_status(&pool, &a.uid, BatchStatus::Completed, None).await.unwrap();
        update_status(&pool, &b.uid, BatchStatus::Failed, Some("boom")).await.unwrap();

        let stats = get_batch_statistics(&pool, "orders").await.unwrap();
        assert_eq!(stats.total_batches, 2);
        assert_eq!(stats.completed_batches, 1);
        assert_eq!(stats.failed_batches, 1);
    }
}
