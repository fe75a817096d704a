// src/ingest/mod.rs
pub mod cooldown;
pub mod providers;
pub mod scheduler;
pub mod types;
pub mod watermark;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::error::FeedError;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("poll_cycles_total", "Completed poll cycles.");
        describe_counter!(
            "feed_events_total",
            "New events returned by a feed after watermark filtering."
        );
        describe_counter!(
            "feed_errors_total",
            "Feed transport/decode/application errors."
        );
        describe_gauge!(
            "feed_watermark_ts",
            "Unix ts of the current watermark per feed."
        );
        describe_counter!("sink_deliveries_total", "Delivery attempts per sink.");
        describe_counter!("sink_failures_total", "Failed deliveries per sink.");
        describe_histogram!("poll_cycle_ms", "Poll cycle duration in milliseconds.");
    });
}

/// Imperva API identity, sent as `x-API-Id` / `x-API-Key` on every feed call.
#[derive(Clone)]
pub struct ApiCredentials {
    pub api_id: String,
    pub api_key: String,
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_id", &self.api_id)
            .field("api_key", &"***")
            .finish()
    }
}

impl ApiCredentials {
    pub fn new(api_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_id: api_id.into(),
            api_key: api_key.into(),
        }
    }

    pub(crate) fn apply(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("x-API-Id", &self.api_id)
            .header("x-API-Key", &self.api_key)
    }
}

/// Shared client for the feeds: bounded so a hung feed cannot stall a cycle.
pub fn feed_http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("imperva-events/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(4))
        .timeout(Duration::from_secs(10))
        .build()
}

/// Error envelope returned by api.imperva.com on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Send a prepared request and decode a JSON body. Non-2xx responses become
/// `FeedError::Feed` carrying the envelope's message (or the raw body).
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    feed: &'static str,
    req: reqwest::RequestBuilder,
) -> Result<T, FeedError> {
    let resp = req
        .send()
        .await
        .map_err(|source| FeedError::Transport { feed, source })?;
    let status = resp.status();
    let body = resp
        .bytes()
        .await
        .map_err(|source| FeedError::Transport { feed, source })?;

    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorEnvelope>(&body)
            .ok()
            .and_then(|env| env.message.or(env.error))
            .unwrap_or_else(|| String::from_utf8_lossy(&body).trim().to_string());
        return Err(FeedError::Feed {
            feed,
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_slice(&body).map_err(|source| FeedError::Decode { feed, source })
}
