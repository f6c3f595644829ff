pub mod concurrency;
pub mod config;

pub use concurrency::{ConcurrencyLimiter, ConcurrencyStats};
pub use config::{ConcurrencyConfig, MonitoringConfig, ResilienceConfig, RetryConfig};
