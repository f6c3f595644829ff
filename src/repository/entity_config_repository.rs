//! Entity configuration repository (§11): where to fetch an entity from,
//! what forms its business key, and its declared parent references.

use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::SyncResult;
use crate::model::{EntityConfig, ParentRefConfig};

pub async fn upsert(
    pool: &SqlitePool,
    entity_name: &str,
    source_api_slug: &str,
    business_key_fields: &[String],
    rowversion_field: Option<&str>,
    sync_enabled: bool,
    sync_schedule: Option<&str>,
    parent_refs_config: &HashMap<String, ParentRefConfig>,
) -> SyncResult<EntityConfig> {
    let existing = get(pool, entity_name).await?;
    let uid = existing.map(|c| c.uid).unwrap_or_else(|| Uuid::now_v7().to_string());
    let created_at = Utc::now().to_rfc3339();

    let bk_json = serde_json::to_string(business_key_fields)?;
    let parent_refs_json = serde_json::to_string(parent_refs_config)?;

    sqlx::query(
        "INSERT INTO entity_config (
            uid, entity_name, source_api_slug, business_key_fields, rowversion_field, sync_enabled,
            sync_schedule, parent_refs_config, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(entity_name) DO UPDATE SET
            source_api_slug = excluded.source_api_slug,
            business_key_fields = excluded.business_key_fields,
            rowversion_field = excluded.rowversion_field,
            sync_enabled = excluded.sync_enabled,
            sync_schedule = excluded.sync_schedule,
            parent_refs_config = excluded.parent_refs_config",
    )
    .bind(&uid)
    .bind(entity_name)
    .bind(source_api_slug)
    .bind(&bk_json)
    .bind(rowversion_field)
    .bind(sync_enabled)
    .bind(sync_schedule)
    .bind(&parent_refs_json)
    .bind(&created_at)
    .execute(pool)
    .await?;

    Ok(EntityConfig {
        uid,
        entity_name: entity_name.to_string(),
        source_api_slug: source_api_slug.to_string(),
        business_key_fields: business_key_fields.to_vec(),
        rowversion_field: rowversion_field.map(str::to_string),
        sync_enabled,
        sync_schedule: sync_schedule.map(str::to_string),
        parent_refs_config: parent_refs_config.clone(),
        created_at,
    })
}

pub async fn get(pool: &SqlitePool, entity_name: &str) -> SyncResult<Option<EntityConfig>> {
    let row: Option<EntityConfigRow> = sqlx::query_as(
        "SELECT uid, entity_name, source_api_slug, business_key_fields, rowversion_field, sync_enabled,
                sync_schedule, parent_refs_config, created_at
         FROM entity_config WHERE entity_name = ?",
    )
    .bind(entity_name)
    .fetch_optional(pool)
    .await?;

    row.map(EntityConfigRow::into_model).transpose()
}

pub async fn list_enabled(pool: &SqlitePool) -> SyncResult<Vec<EntityConfig>> {
    let rows: Vec<EntityConfigRow> = sqlx::query_as(
        "SELECT uid, entity_name, source_api_slug, business_key_fields, rowversion_field, sync_enabled,
                sync_schedule, parent_refs_config, created_at
         FROM entity_config WHERE sync_enabled = 1",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(EntityConfigRow::into_model).collect()
}

pub async fn delete(pool: &SqlitePool, entity_name: &str) -> SyncResult<()> {
    sqlx::query("DELETE FROM entity_config WHERE entity_name = ?")
        .bind(entity_name)
        .execute(pool)
        .await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct EntityConfigRow {
    uid: String,
    entity_name: String,
    source_api_slug: String,
    business_key_fields: String,
    rowversion_field: Option<String>,
    sync_enabled: bool,
    sync_schedule: Option<String>,
    parent_refs_config: Option<String>,
    created_at: String,
}

impl EntityConfigRow {
    fn into_model(self) -> SyncResult<EntityConfig> {
        Ok(EntityConfig {
            uid: self.uid,
            entity_name: self.entity_name,
            source_api_slug: self.source_api_slug,
            business_key_fields: serde_json::from_str(&self.business_key_fields)?,
            rowversion_field: self.rowversion_field,
            sync_enabled: self.sync_enabled,
            sync_schedule: self.sync_schedule,
            parent_refs_config: match self.parent_refs_config {
                Some(json) => serde_json::from_str(&json)?,
                None => HashMap::new(),
            },
            created_at: self.created_at,
        })
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
    async fn upsert_then_get_round_trips_json_columns() {
        let pool = pool().await;
        let mut parent_refs = HashMap::new();
        parent_refs.insert(
            "customer".to_string(),
            ParentRefConfig {
                parent_entity: "customers".to_string(),
                parent_field: "customer_id".to_string(),
                child_field: "customer_ref".to_string(),
            },
        );

        upsert(&pool, "orders", "orders-api", &["order_id".to_string()], Some("rowversion"), true, None, &parent_refs)
            .await
            .unwrap();

        let fetched = get(&pool, "orders").await.unwrap().unwrap();
        assert_eq!(fetched.business_key_fields, vec!["order_id".to_string()]);
        assert_eq!(fetched.parent_refs_config.len(), 1);
    }

    #[tokio::test]
    async fn upsert_twice_updates_in_place_rather_than_duplicating() {
        let pool = pool().await;
        let first = upsert(&pool, "orders", "orders-api", &["order_id".to_string()], None, true, None, &HashMap::new())
            .await
            .unwrap();
        let second =
            upsert(&pool, "orders", "orders-api-v2", &["order_id".to_string()], None, false, None, &HashMap::new())
                .await
                .unwrap();

        assert_eq!(first.uid, second.uid);
        let fetched = get(&pool, "orders").await.unwrap().unwrap();
        assert_eq!(fetched.source_api_slug, "orders-api-v2");
        assert!(!fetched.sync_enabled);
    }

    #[tokio::test]
    async fn list_enabled_excludes_disabled_entities() {
        let pool = pool().await;
        upsert(&pool, "orders", "a", &["id".to_string()], None, true, None, &HashMap::new()).await.unwrap();
        upsert(&pool, "archive", "b", &["id".to_string()], None, false, None, &HashMap::new()).await.unwrap();

        let enabled = list_enabled(&pool).await.unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].entity_name, "orders");
    }
}
