//! Parent-child resolver queue repository: child records waiting on a
//! parent's business key to appear in the sink (§4.4, §11).

use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::SyncResult;
use crate::model::PendingChild;

pub async fn create(
    pool: &SqlitePool,
    batch_uid: &str,
    child_entity: &str,
    parent_entity: &str,
    parent_bk_hash: &str,
    child_payload: &Value,
    max_retries: i64,
) -> SyncResult<PendingChild> {
    let uid = Uuid::now_v7().to_string();
    let created_at = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO pending_children (
            uid, batch_uid, child_entity, parent_entity, parent_bk_hash, child_payload,
            retry_count, max_retries, next_retry_at, resolved_at, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, 0, ?, NULL, NULL, ?)",
    )
    .bind(&uid)
    .bind(batch_uid)
    .bind(child_entity)
    .bind(parent_entity)
    .bind(parent_bk_hash)
    .bind(serde_json::to_string(child_payload)?)
    .bind(max_retries)
    .bind(&created_at)
    .execute(pool)
    .await?;

    Ok(PendingChild {
        uid,
        batch_uid: batch_uid.to_string(),
        child_entity: child_entity.to_string(),
        parent_entity: parent_entity.to_string(),
        parent_bk_hash: parent_bk_hash.to_string(),
        child_payload: child_payload.clone(),
        retry_count: 0,
        max_retries,
        next_retry_at: None,
        resolved_at: None,
        created_at,
    })
}

pub async fn list_due_for_retry(pool: &SqlitePool, now: &str) -> SyncResult<Vec<PendingChild>> {
    let rows: Vec<PendingChildRow> = sqlx::query_as(
        "SELECT uid, batch_uid, child_entity, parent_entity, parent_bk_hash, child_payload,
                retry_count, max_retries, next_retry_at, resolved_at, created_at
         FROM pending_children
         WHERE resolved_at IS NULL AND retry_count < max_retries
           AND (next_retry_at IS NULL OR next_retry_at <= ?)
         ORDER BY created_at ASC",
    )
    .bind(now)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(PendingChildRow::into_model).collect()
}

/// Children whose retry budget is exhausted and have not yet been resolved —
/// the resolver moves these into `failed_records` rather than retrying forever.
pub async fn list_exhausted(pool: &SqlitePool) -> SyncResult<Vec<PendingChild>> {
    let rows: Vec<PendingChildRow> = sqlx::query_as(
        "SELECT uid, batch_uid, child_entity, parent_entity, parent_bk_hash, child_payload,
                retry_count, max_retries, next_retry_at, resolved_at, created_at
         FROM pending_children WHERE resolved_at IS NULL AND retry_count >= max_retries",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(PendingChildRow::into_model).collect()
}

pub async fn schedule_retry(pool: &SqlitePool, uid: &str, next_retry_at: &str) -> SyncResult<()> {
    sqlx::query("UPDATE pending_children SET retry_count = retry_count + 1, next_retry_at = ? WHERE uid = ?")
        .bind(next_retry_at)
        .bind(uid)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_resolved(pool: &SqlitePool, uid: &str) -> SyncResult<()> {
    sqlx::query("UPDATE pending_children SET resolved_at = ? WHERE uid = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(uid)
        .execute(pool)
        .await?;
    Ok(())
}

#[derive(Debug, Default)]
pub struct PendingStatistics {
    pub pending: i64,
    pub resolved: i64,
    pub exhausted: i64,
}

pub async fn get_pending_statistics(pool: &SqlitePool, entity_name: &str) -> SyncResult<PendingStatistics> {
    let row: (i64, i64, i64) = sqlx::query_as(
        "SELECT
            COALESCE(SUM(CASE WHEN resolved_at IS NULL AND retry_count < max_retries THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN resolved_at IS NOT NULL THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN resolved_at IS NULL AND retry_count >= max_retries THEN 1 ELSE 0 END), 0)
         FROM pending_children WHERE child_entity = ?",
    )
    .bind(entity_name)
    .fetch_one(pool)
    .await?;

    Ok(PendingStatistics {
        pending: row.0,
        resolved: row.1,
        exhausted: row.2,
    })
}

pub async fn cleanup_resolved(pool: &SqlitePool, days_old: i64) -> SyncResult<u64> {
    let cutoff = (Utc::now() - chrono::Duration::days(days_old)).to_rfc3339();
    let result = sqlx::query("DELETE FROM pending_children WHERE resolved_at IS NOT NULL AND resolved_at < ?")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[derive(sqlx::FromRow)]
struct PendingChildRow {
    uid: String,
    batch_uid: String,
    child_entity: String,
    parent_entity: String,
    parent_bk_hash: String,
    child_payload: String,
    retry_count: i64,
    max_retries: i64,
    next_retry_at: Option<String>,
    resolved_at: Option<String>,
    created_at: String,
}

impl PendingChildRow {
    fn into_model(self) -> SyncResult<PendingChild> {
        Ok(PendingChild {
            uid: self.uid,
            batch_uid: self.batch_uid,
            child_entity: self.child_entity,
            parent_entity: self.parent_entity,
            parent_bk_hash: self.parent_bk_hash,
            child_payload: serde_json::from_str(&self.child_payload)?,
            retry_count: self.retry_count,
            max_retries: self.max_retries,
            next_retry_at: self.next_retry_at,
            resolved_at: self.resolved_at,
            created_at: self.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SyncType;
    use crate::repository::batch_repository;

    async fn pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn create_then_list_due_for_retry_round_trips() {
        let pool = pool().await;
        let batch = batch_repository::create_batch(&pool, "orders", SyncType::Full, None, None).await.unwrap();
        let payload = serde_json::json!({"order_id": 1});

        let child = create(&pool, &batch.uid, "orders", "customers", "bk123", &payload, 5).await.unwrap();

        let due = list_due_for_retry(&pool, "2030-01-01T00:00:00Z").await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].uid, child.uid);
        assert_eq!(due[0].child_payload, payload);
    }

    #[tokio::test]
    async fn list_exhausted_only_returns_rows_past_retry_budget() {
        let pool = pool().await;
        let batch = batch_repository::create_batch(&pool, "orders", SyncType::Full, None, None).await.unwrap();
        let payload = serde_json::json!({});

        let exhausted = create(&pool, &batch.uid, "orders", "customers", "bk1", &payload, 1).await.unwrap();
        schedule_retry(&pool, &exhausted.uid, "2020-01-01T00:00:00Z").await.unwrap();

        let fresh = create(&pool, &batch.uid, "orders", "customers", "bk2", &payload, 3).await.unwrap();

        let result = list_exhausted(&pool).await.unwrap();
        let uids: Vec<_> = result.iter().map(|r| r.uid.clone()).collect();
        assert!(uids.contains(&exhausted.uid));
        assert!(!uids.contains(&fresh.uid));
    }

    #[tokio::test]
    async fn get_pending_statistics_counts_each_bucket() {
        let pool = pool().await;
        let batch = batch_repository::create_batch(&pool, "orders", SyncType::Full, None, None).await.unwrap();
        let payload = serde_json::json!({});

        let resolved = create(&pool, &batch.uid, "orders", "customers", "bk1", &payload, 3).await.unwrap();
        mark_resolved(&pool, &resolved.uid).await.unwrap();
        create(&pool, &batch.uid, "orders", "customers", "bk2", &payload, 3).await.unwrap();

        let stats = get_pending_statistics(&pool, "orders").await.unwrap();
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.pending, 1);
    }
}
