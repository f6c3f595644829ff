//! HTTP clients for the source and sink systems (§4.6, §4.7), plus the
//! shared auth and resilience machinery they both build on.

pub mod auth;
pub mod http;
pub mod resilience;
pub mod sink_client;
pub mod source_client;

pub use resilience::{ConcurrencyConfig, ConcurrencyLimiter, ResilienceConfig};
pub use sink_client::SinkClient;
pub use source_client::SourceClient;

use crate::config::Settings;
use http::AuthedClient;

/// Construct both clients from `Settings`, sharing one resilience config
/// and one HTTP connection pool per §5's bounded-connection-pool policy.
pub fn build_clients(settings: &Settings) -> (SourceClient, SinkClient) {
    let http = reqwest::Client::builder()
        .pool_max_idle_per_host(5)
        .build()
        .expect("reqwest client configuration is static and always valid");

    let resilience = ResilienceConfig::from_settings(settings);

    let source_auth = AuthedClient::new(&settings.source_api_url, &settings.source_api_token, http.clone());
    let source_limiter = ConcurrencyLimiter::new(resilience.concurrency.clone());
    let source = SourceClient::new(source_auth, source_limiter);

    let sink_auth = AuthedClient::new(&settings.sink_api_url, &settings.sink_api_token, http);
    let sink_limiter = ConcurrencyLimiter::new(resilience.concurrency.clone());
    let sink = SinkClient::new(sink_auth, sink_limiter);

    (source, sink)
}
