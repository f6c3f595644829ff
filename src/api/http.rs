//! Shared request-with-auth-refresh helper used by both the source and
//! sink clients (§4.6, §4.7): on a 401, refresh the token once and retry;
//! a second 401 surfaces as an authentication error.

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use super::auth::TokenStore;
use crate::error::{SyncError, SyncResult};

pub struct AuthedClient {
    pub http: reqwest::Client,
    pub base_url: String,
    pub tokens: TokenStore,
    pub static_token: String,
}

impl AuthedClient {
    pub fn new(base_url: impl Into<String>, static_token: impl Into<String>, http: reqwest::Client) -> Self {
        let base_url = base_url.into();
        let tokens = TokenStore::new(base_url.clone(), http.clone());
        let static_token = static_token.into();
        tokens.seed(static_token.clone());
        Self {
            http,
            base_url,
            tokens,
            static_token,
        }
    }

    fn build(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let token = self.tokens.current_access_token().unwrap_or_default();
        self.http.request(method, url).bearer_auth(token)
    }

    /// Send a request built from `build`, retrying once on 401 after a
    /// refresh (or, for the static-token case, re-seeding from config).
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> SyncResult<T> {
        let response = self.dispatch(method.clone(), path, body).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            if self.tokens.refresh().await.is_err() {
                self.tokens.seed(self.static_token.clone());
            }
            let retried = self.dispatch(method, path, body).await?;
            if retried.status() == StatusCode::UNAUTHORIZED {
                return Err(SyncError::authentication(
                    "request rejected after re-authentication",
                ));
            }
            return Self::parse(retried).await;
        }

        Self::parse(response).await
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> SyncResult<reqwest::Response> {
        let mut req = self.build(method, path);
        if let Some(b) = body {
            req = req.json(b);
        }
        Ok(req.send().await?)
    }

    /// Send a request expecting no response body (DELETE), retrying once on
    /// 401 the same way `send_json` does.
    pub async fn send_no_content(&self, method: Method, path: &str) -> SyncResult<()> {
        let response = self.dispatch(method.clone(), path, None).await?;

        let response = if response.status() == StatusCode::UNAUTHORIZED {
            if self.tokens.refresh().await.is_err() {
                self.tokens.seed(self.static_token.clone());
            }
            let retried = self.dispatch(method, path, None).await?;
            if retried.status() == StatusCode::UNAUTHORIZED {
                return Err(SyncError::authentication(
                    "request rejected after re-authentication",
                ));
            }
            retried
        } else {
            response
        };

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::connection(format!(
                "request failed with status {status}: {text}"
            )));
        }
        Ok(())
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> SyncResult<T> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SyncError::connection(format!(
                "request failed with status {status}: {text}"
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| SyncError::connection(format!("malformed response body: {e}")))
    }
}
