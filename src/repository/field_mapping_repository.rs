//! Field-mapping repository (§4.2, §11): the persisted form of normalizer
//! layer 5's declarative field map.

use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::SyncResult;
use crate::model::{FieldMapping, Transformation};

pub async fn set_mapping(
    pool: &SqlitePool,
    entity_name: &str,
    source_field: &str,
    target_field: &str,
    transformation: Transformation,
    is_required: bool,
    default_value: Option<&Value>,
) -> SyncResult<()> {
    let uid = Uuid::now_v7().to_string();
    let default_json = default_value.map(serde_json::to_string).transpose()?;

    sqlx::query(
        "INSERT INTO field_mappings (uid, entity_name, source_field, target_field, transformation, is_required, default_value)
         VALUES (?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(entity_name, source_field, target_field) DO UPDATE SET
            transformation = excluded.transformation,
            is_required = excluded.is_required,
            default_value = excluded.default_value",
    )
    .bind(&uid)
    .bind(entity_name)
    .bind(source_field)
    .bind(target_field)
    .bind(transformation.label())
    .bind(is_required)
    .bind(default_json)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list_for_entity(pool: &SqlitePool, entity_name: &str) -> SyncResult<Vec<FieldMapping>> {
    let rows: Vec<FieldMappingRow> = sqlx::query_as(
        "SELECT uid, entity_name, source_field, target_field, transformation, is_required, default_value
         FROM field_mappings WHERE entity_name = ? ORDER BY source_field, target_field",
    )
    .bind(entity_name)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(FieldMappingRow::into_model).collect()
}

pub async fn delete_mapping(pool: &SqlitePool, entity_name: &str, source_field: &str, target_field: &str) -> SyncResult<()> {
    sqlx::query("DELETE FROM field_mappings WHERE entity_name = ? AND source_field = ? AND target_field = ?")
        .bind(entity_name)
        .bind(source_field)
        .bind(target_field)
        .execute(pool)
        .await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct FieldMappingRow {
    uid: String,
    entity_name: String,
    source_field: String,
    target_field: String,
    transformation: String,
    is_required: bool,
    default_value: Option<String>,
}

impl FieldMappingRow {
    fn into_model(self) -> SyncResult<FieldMapping> {
        Ok(FieldMapping {
            uid: self.uid,
            entity_name: self.entity_name,
            source_field: self.source_field,
            target_field: self.target_field,
            transformation: Transformation::from_label(&self.transformation).unwrap_or(Transformation::None),
            is_required: self.is_required,
            default_value: self.default_value.as_deref().map(serde_json::from_str).transpose()?,
        })
    }
}
