//! Semaphore-based limiter bounding concurrent HTTP requests to an external
//! service, ported from the host crate's Dynamics-facing concurrency
//! limiter (§5: bounded connection pool per external service).

use super::config::ConcurrencyConfig;
use log::debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    config: ConcurrencyConfig,
    requests_acquired: Arc<AtomicU64>,
    requests_waited: Arc<AtomicU64>,
}

impl ConcurrencyLimiter {
    pub fn new(config: ConcurrencyConfig) -> Self {
        let permits = if config.enabled {
            config.max_concurrent_requests
        } else {
            1_000_000
        };

        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            config,
            requests_acquired: Arc::new(AtomicU64::new(0)),
            requests_waited: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        let available_before = self.semaphore.available_permits();
        if self.config.enabled && available_before == 0 {
            self.requests_waited.fetch_add(1, Ordering::Relaxed);
            debug!("concurrency limiter: waiting for permit");
        }

        let permit = self.semaphore.clone().acquire_owned().await.unwrap();
        self.requests_acquired.fetch_add(1, Ordering::Relaxed);
        permit
    }

    pub fn available_permits(&self) -> usize {
        if !self.config.enabled {
            return usize::MAX;
        }
        self.semaphore.available_permits()
    }

    pub fn stats(&self) -> ConcurrencyStats {
        ConcurrencyStats {
            available_permits: self.available_permits(),
            max_concurrent_requests: self.config.max_concurrent_requests,
            requests_acquired: self.requests_acquired.load(Ordering::Relaxed),
            requests_waited: self.requests_waited.load(Ordering::Relaxed),
            enabled: self.config.enabled,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConcurrencyStats {
    pub available_permits: usize,
    pub max_concurrent_requests: usize,
    pub requests_acquired: u64,
    pub requests_waited: u64,
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_blocks_when_at_capacity() {
        let limiter = ConcurrencyLimiter::new(ConcurrencyConfig {
            max_concurrent_requests: 1,
            enabled: true,
        });

        let permit = limiter.acquire().await;
        assert_eq!(limiter.available_permits(), 0);

        let limiter_clone = limiter.clone();
        let handle = tokio::spawn(async move {
            let _p = limiter_clone.acquire().await;
        });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        drop(permit);

        tokio::time::timeout(std::time::Duration::from_millis(200), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn disabled_limiter_never_blocks() {
        let limiter = ConcurrencyLimiter::new(ConcurrencyConfig {
            max_concurrent_requests: 1,
            enabled: false,
        });
        let _p1 = limiter.acquire().await;
        let _p2 = limiter.acquire().await;
        assert_eq!(limiter.available_permits(), usize::MAX);
    }

    #[tokio::test]
    async fn stats_report_acquisitions() {
        let limiter = ConcurrencyLimiter::new(ConcurrencyConfig {
            max_concurrent_requests: 3,
            enabled: true,
        });
        let _p1 = limiter.acquire().await;
        let _p2 = limiter.acquire().await;
        let stats = limiter.stats();
        assert_eq!(stats.requests_acquired, 2);
        assert_eq!(stats.available_permits, 1);
    }
}
