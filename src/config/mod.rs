//! Application configuration, loaded once at process entry from the environment.
//!
//! Settings are a plain struct constructed by [`Settings::from_env`] and then
//! threaded through the rest of the program by reference — there is no
//! global/`static` settings instance, per the lifetime-scoped-container
//! redesign note: the database pool, HTTP clients and scheduler are all
//! constructed once in `main` and handed to the pieces that need them.

use crate::error::{SyncError, SyncResult};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    pub app_env: String,
    pub log_level: String,

    pub database_url: String,
    pub database_pool_size: u32,

    pub source_api_url: String,
    pub source_api_token: String,
    pub sink_api_url: String,
    pub sink_api_token: String,

    pub default_batch_size: usize,
    pub max_batch_size: usize,

    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_retry_delay_seconds: u64,

    pub background_sync_enabled: bool,
    pub background_sync_window_start: String,
    pub background_sync_window_end: String,
}

impl Settings {
    /// Load settings from the environment, falling back to a local `.env`
    /// file if present (via `dotenvy`, matching how the host project loads
    /// its own local environment overrides).
    pub fn from_env() -> SyncResult<Self> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            app_env: env_or("APP_ENV", "development"),
            log_level: env_or("LOG_LEVEL", "info"),

            database_url: env_or("DATABASE_URL", "sqlite://syncflow.db"),
            database_pool_size: env_parse_or("DATABASE_POOL_SIZE", 20)?,

            source_api_url: required_env("SOURCE_API_URL")?,
            source_api_token: env_or("SOURCE_API_TOKEN", ""),
            sink_api_url: required_env("SINK_API_URL")?,
            sink_api_token: env_or("SINK_API_TOKEN", ""),

            default_batch_size: env_parse_or("DEFAULT_BATCH_SIZE", 1000)?,
            max_batch_size: env_parse_or("MAX_BATCH_SIZE", 10_000)?,

            max_retries: env_parse_or("MAX_RETRIES", 3)?,
            retry_delay_seconds: env_parse_or("RETRY_DELAY_SECONDS", 60)?,
            max_retry_delay_seconds: env_parse_or("MAX_RETRY_DELAY_SECONDS", 3600)?,

            background_sync_enabled: env_parse_or("BACKGROUND_SYNC_ENABLED", true)?,
            background_sync_window_start: env_or("BACKGROUND_SYNC_WINDOW_START", "19:00:00"),
            background_sync_window_end: env_or("BACKGROUND_SYNC_WINDOW_END", "07:00:00"),
        })
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_seconds)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_secs(self.max_retry_delay_seconds)
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn required_env(key: &str) -> SyncResult<String> {
    env::var(key).map_err(|_| {
        SyncError::configuration(format!("missing required environment variable {key}"))
    })
}

fn env_parse_or<T>(key: &str, default: T) -> SyncResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse::<T>().map_err(|e| {
            SyncError::configuration(format!("invalid value for {key}: {e}"))
        }),
        Err(_) => Ok(default),
    }
}
