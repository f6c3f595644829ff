//! Per-entity sync cursor repository (§4.5, §11): tracks the row-version and
//! timestamp the last successful batch left off at, so an incremental sync
//! knows where to resume.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::SyncResult;
use crate::model::SyncState;

pub async fn get(pool: &SqlitePool, entity_name: &str, source_system: &str) -> SyncResult<Option<SyncState>> {
    let row: Option<SyncState> = sqlx::query_as(
        "SELECT entity_name, source_system, last_sync_rowversion, last_sync_timestamp, last_batch_uid
         FROM sync_state WHERE entity_name = ? AND source_system = ?",
    )
    .bind(entity_name)
    .bind(source_system)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Advance the cursor after a successful batch. Upserts because the first
/// sync for an `(entity_name, source_system)` pair has no prior row.
pub async fn advance(
    pool: &SqlitePool,
    entity_name: &str,
    source_system: &str,
    last_sync_rowversion: Option<&str>,
    last_batch_uid: &str,
) -> SyncResult<()> {
    sqlx::query(
        "INSERT INTO sync_state (entity_name, source_system, last_sync_rowversion, last_sync_timestamp, last_batch_uid)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(entity_name, source_system) DO UPDATE SET
            last_sync_rowversion = excluded.last_sync_rowversion,
            last_sync_timestamp = excluded.last_sync_timestamp,
            last_batch_uid = excluded.last_batch_uid",
    )
    .bind(entity_name)
    .bind(source_system)
    .bind(last_sync_rowversion)
    .bind(Utc::now().to_rfc3339())
    .bind(last_batch_uid)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn reset(pool: &SqlitePool, entity_name: &str, source_system: &str) -> SyncResult<()> {
    sqlx::query("DELETE FROM sync_state WHERE entity_name = ? AND source_system = ?")
        .bind(entity_name)
        .bind(source_system)
        .execute(pool)
        .await?;
    Ok(())
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
    async fn advance_then_get_round_trips() {
        let pool = pool().await;
        let batch = batch_repository::create_batch(&pool, "orders", SyncType::Incremental, Some("erp"), None)
            .await
            .unwrap();

        advance(&pool, "orders", "erp", Some("00000000001"), &batch.uid).await.unwrap();

        let state = get(&pool, "orders", "erp").await.unwrap().unwrap();
        assert_eq!(state.last_sync_rowversion.as_deref(), Some("00000000001"));
        assert_eq!(state.last_batch_uid.as_deref(), Some(batch.uid.as_str()));
    }

    #[tokio::test]
    async fn advance_twice_overwrites_instead_of_duplicating() {
        let pool = pool().await;
        let first = batch_repository::create_batch(&pool, "orders", SyncType::Incremental, Some("erp"), None).await.unwrap();
        let second = batch_repository::create_batch(&pool, "orders", SyncType::Incremental, Some("erp"), None).await.unwrap();

        advance(&pool, "orders", "erp", Some("1"), &first.uid).await.unwrap();
        advance(&pool, "orders", "erp", Some("2"), &second.uid).await.unwrap();

        let state = get(&pool, "orders", "erp").await.unwrap().unwrap();
        assert_eq!(state.last_sync_rowversion.as_deref(), Some("2"));
        assert_eq!(state.last_batch_uid.as_deref(), Some(second.uid.as_str()));
    }

    #[tokio::test]
    async fn get_without_prior_sync_returns_none() {
        let pool = pool().await;
        assert!(get(&pool, "orders", "erp").await.unwrap().is_none());
    }
}
