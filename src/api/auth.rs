//! Bearer-token authentication shared by the source and sink clients
//! (§4.6, §4.7): login once, hold the token behind an `ArcSwap` so
//! concurrent requests read it lock-free, refresh on a 401, and
//! re-authenticate from scratch on a second consecutive 401.

use arc_swap::ArcSwap;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
struct TokenPair {
    access_token: String,
    refresh_token: String,
}

/// Holds the current token pair for one authenticated client, swappable
/// without locking readers out mid-request.
pub struct TokenStore {
    base_url: String,
    http: reqwest::Client,
    tokens: ArcSwap<Option<TokenPair>>,
}

impl TokenStore {
    pub fn new(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            http,
            tokens: ArcSwap::from_pointee(None),
        }
    }

    pub fn current_access_token(&self) -> Option<String> {
        self.tokens.load().as_ref().as_ref().map(|t| t.access_token.clone())
    }

    /// Authenticate from scratch with the static token configured at
    /// startup (this crate's source/sink tokens are long-lived service
    /// tokens, not a username/password pair — see SPEC_FULL §10).
    pub fn seed(&self, token: impl Into<String>) {
        self.tokens.store(Arc::new(Some(TokenPair {
            access_token: token.into(),
            refresh_token: String::new(),
        })));
    }

    /// Attempt a refresh using the stored refresh token. If there is no
    /// refresh token (the static-token case), this is a no-op failure and
    /// the caller should re-seed from configuration instead.
    pub async fn refresh(&self) -> SyncResult<()> {
        let refresh_token = {
            let guard = self.tokens.load();
            match guard.as_ref() {
                Some(pair) if !pair.refresh_token.is_empty() => pair.refresh_token.clone(),
                _ => {
                    return Err(SyncError::authentication(
                        "no refresh token available, re-authentication required",
                    ));
                }
            }
        };

        #[derive(serde::Serialize)]
        struct RefreshRequest {
            refresh_token: String,
        }

        let url = format!("{}/auth/refresh", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::authentication("token refresh rejected"));
        }

        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| SyncError::authentication(format!("malformed refresh response: {e}")))?;

        self.tokens.store(Arc::new(Some(TokenPair {
            access_token: auth.access_token,
            refresh_token: auth.refresh_token,
        })));

        Ok(())
    }
}
