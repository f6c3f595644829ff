//! Sink-API client (§4.7): CRUD against the destination system, keyed by
//! business-key hash, plus the batch operations the ingest stage needs.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::http::AuthedClient;
use super::resilience::ConcurrencyLimiter;
use crate::error::SyncResult;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BatchOpResult {
    pub success_count: u32,
    pub failure_count: u32,
    pub failures: Vec<BatchOpFailure>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchOpFailure {
    #[serde(default)]
    pub record: Option<Value>,
    #[serde(default)]
    pub uid: Option<String>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateOp {
    pub uid: String,
    pub data: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct BatchQueryResponse {
    records: HashMap<String, Value>,
}

pub struct SinkClient {
    client: AuthedClient,
    limiter: ConcurrencyLimiter,
}

impl SinkClient {
    pub fn new(client: AuthedClient, limiter: ConcurrencyLimiter) -> Self {
        Self { client, limiter }
    }

    pub async fn get_by_bk_hash(&self, entity: &str, bk: &str) -> SyncResult<Option<Value>> {
        let _permit = self.limiter.acquire().await;
        let path = format!("/{entity}?erp_key_hash={bk}");
        let result: Option<Value> = self.client.send_json(Method::GET, &path, None).await?;
        Ok(result)
    }

    pub async fn get_batch_by_bk_hashes(
        &self,
        entity: &str,
        bks: &[String],
    ) -> SyncResult<HashMap<String, Value>> {
        if bks.is_empty() {
            return Ok(HashMap::new());
        }
        let _permit = self.limiter.acquire().await;
        let path = format!("/{entity}/batch/query");
        let body = serde_json::json!({ "erp_key_hashes": bks });
        let response: BatchQueryResponse =
            self.client.send_json(Method::POST, &path, Some(&body)).await?;
        Ok(response.records)
    }

    pub async fn insert(&self, entity: &str, record: &Value) -> SyncResult<Value> {
        let _permit = self.limiter.acquire().await;
        let path = format!("/{entity}");
        self.client.send_json(Method::POST, &path, Some(record)).await
    }

    pub async fn update(&self, entity: &str, uid: &str, delta: &Value) -> SyncResult<Value> {
        let _permit = self.limiter.acquire().await;
        let path = format!("/{entity}/{uid}");
        self.client.send_json(Method::PATCH, &path, Some(delta)).await
    }

    pub async fn delete(&self, entity: &str, uid: &str) -> SyncResult<()> {
        let _permit = self.limiter.acquire().await;
        let path = format!("/{entity}/{uid}");
        self.client.send_no_content(Method::DELETE, &path).await
    }

    pub async fn batch_insert(&self, entity: &str, records: &[Value]) -> SyncResult<BatchOpResult> {
        if records.is_empty() {
            return Ok(BatchOpResult::default());
        }
        let _permit = self.limiter.acquire().await;
        let path = format!("/{entity}/batch/insert");
        let body = serde_json::json!({ "records": records });
        self.client.send_json(Method::POST, &path, Some(&body)).await
    }

    pub async fn batch_update(&self, entity: &str, updates: &[UpdateOp]) -> SyncResult<BatchOpResult> {
        if updates.is_empty() {
            return Ok(BatchOpResult::default());
        }
        let _permit = self.limiter.acquire().await;
        let path = format!("/{entity}/batch/update");
        let body = serde_json::json!({ "updates": updates });
        self.client.send_json(Method::POST, &path, Some(&body)).await
    }

    pub async fn batch_delete(&self, entity: &str, uids: &[String]) -> SyncResult<BatchOpResult> {
        if uids.is_empty() {
            return Ok(BatchOpResult::default());
        }
        let _permit = self.limiter.acquire().await;
        let path = format!("/{entity}/batch/delete");
        let body = serde_json::json!({ "uids": uids });
        self.client.send_json(Method::POST, &path, Some(&body)).await
    }

    pub async fn parent_exists(&self, entity: &str, bk: &str) -> SyncResult<bool> {
        Ok(self.get_by_bk_hash(entity, bk).await?.is_some())
    }

    pub async fn parents_exist(
        &self,
        entity: &str,
        bks: &[String],
    ) -> SyncResult<HashMap<String, bool>> {
        let found = self.get_batch_by_bk_hashes(entity, bks).await?;
        Ok(bks
            .iter()
            .map(|bk| (bk.clone(), found.contains_key(bk)))
            .collect())
    }
}
