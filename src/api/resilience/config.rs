//! Resilience configuration for the source/sink API clients: retry,
//! concurrency, and monitoring knobs, adapted from the host crate's
//! Dynamics-facing resilience config with the `BypassConfig` section
//! dropped — there is no Dynamics custom-business-logic concept here.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    pub concurrency: ConcurrencyConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

#[derive(Debug, Clone)]
pub struct ConcurrencyConfig {
    pub max_concurrent_requests: usize,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    pub request_logging: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 10,
            enabled: true,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            request_logging: true,
        }
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            monitoring: MonitoringConfig::default(),
        }
    }
}

impl ResilienceConfig {
    pub fn from_settings(settings: &crate::config::Settings) -> Self {
        Self {
            retry: RetryConfig {
                max_attempts: settings.max_retries as u32,
                base_delay: settings.retry_delay(),
                max_delay: settings.max_retry_delay(),
                backoff_multiplier: 2.0,
            },
            concurrency: ConcurrencyConfig {
                max_concurrent_requests: 10,
                enabled: true,
            },
            monitoring: MonitoringConfig {
                request_logging: true,
            },
        }
    }

    /// Disable retries and concurrency limiting, for deterministic tests.
    pub fn disabled() -> Self {
        Self {
            retry: RetryConfig {
                max_attempts: 1,
                base_delay: Duration::from_millis(0),
                max_delay: Duration::from_millis(0),
                backoff_multiplier: 1.0,
            },
            concurrency: ConcurrencyConfig {
                max_concurrent_requests: usize::MAX,
                enabled: false,
            },
            monitoring: MonitoringConfig {
                request_logging: false,
            },
        }
    }
}
