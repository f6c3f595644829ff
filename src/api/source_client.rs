//! Source-API client (§4.6): paged record fetch via a named, executable
//! API definition.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::http::AuthedClient;
use super::resilience::ConcurrencyLimiter;
use crate::error::SyncResult;

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteRequest {
    pub page: u32,
    pub page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteMetadata {
    pub total_rows: u64,
    pub page: u32,
    pub page_size: u32,
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecuteResponse {
    pub success: bool,
    pub data: Vec<Value>,
    pub metadata: ExecuteMetadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiDefinition {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Connector {
    pub slug: String,
    pub name: String,
}

pub struct SourceClient {
    client: AuthedClient,
    limiter: ConcurrencyLimiter,
}

impl SourceClient {
    pub fn new(client: AuthedClient, limiter: ConcurrencyLimiter) -> Self {
        Self { client, limiter }
    }

    pub async fn list_connectors(&self) -> SyncResult<Vec<Connector>> {
        let _permit = self.limiter.acquire().await;
        self.client
            .send_json(Method::GET, "/connectors", None)
            .await
    }

    pub async fn list_apis(&self, connector_slug: &str) -> SyncResult<Vec<ApiDefinition>> {
        let _permit = self.limiter.acquire().await;
        let path = format!("/connectors/{connector_slug}/apis");
        self.client.send_json(Method::GET, &path, None).await
    }

    pub async fn get_api_definition(&self, slug: &str) -> SyncResult<ApiDefinition> {
        let _permit = self.limiter.acquire().await;
        let path = format!("/apis/{slug}");
        self.client.send_json(Method::GET, &path, None).await
    }

    pub async fn execute(&self, slug: &str, request: ExecuteRequest) -> SyncResult<ExecuteResponse> {
        let _permit = self.limiter.acquire().await;
        let path = format!("/runtime/{slug}/execute");
        let body = serde_json::to_value(&request)
            .map_err(|e| crate::error::SyncError::connection(format!("bad request body: {e}")))?;
        self.client.send_json(Method::POST, &path, Some(&body)).await
    }

    /// Page through `execute` until the accumulated row count reaches
    /// `total_rows`, `data` comes back empty, or `max_pages` is hit.
    pub async fn execute_all_pages(
        &self,
        slug: &str,
        page_size: u32,
        filters: Option<Value>,
        sort: Option<Value>,
        max_pages: Option<u32>,
    ) -> SyncResult<Vec<Value>> {
        let mut accumulated = Vec::new();
        let mut page = 1;

        loop {
            let response = self
                .execute(
                    slug,
                    ExecuteRequest {
                        page,
                        page_size,
                        filters: filters.clone(),
                        sort: sort.clone(),
                    },
                )
                .await?;

            if response.data.is_empty() {
                break;
            }

            accumulated.extend(response.data);

            if accumulated.len() as u64 >= response.metadata.total_rows {
                break;
            }
            if let Some(max) = max_pages {
                if page >= max {
                    break;
                }
            }
            page += 1;
        }

        Ok(accumulated)
    }
}
