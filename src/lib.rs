// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod event;
pub mod ingest;
pub mod metrics;
pub mod notify;

// ---- Re-exports for stable public API ----
pub use crate::config::Settings;
pub use crate::error::{ConfigError, FeedError, SinkError};
pub use crate::event::Event;
pub use crate::ingest::scheduler::{CycleReport, Poller};
pub use crate::ingest::watermark::WatermarkedSource;
pub use crate::notify::{Notifier, NotifierMux};

use crate::ingest::providers::{
    AuditTrailProvider, BillingProvider, BillingRule, InfraEventsProvider,
};
use crate::notify::{ConsoleNotifier, GrafanaNotifier, SlackNotifier};

/// Wire feeds and sinks from validated settings.
///
/// Feeds: infra, audit, and billing when an account id is set.
/// Sinks: console always, Slack and Grafana when fully configured.
pub fn build_poller(settings: &Settings) -> Result<Poller, ConfigError> {
    settings.validate()?;
    let creds = settings.credentials()?;
    let account = settings.account_id();
    let lookback = settings.lookback();
    let feed_client = ingest::feed_http_client().map_err(|e| ConfigError::Invalid {
        name: "http-client",
        reason: e.to_string(),
    })?;

    let mut mux = NotifierMux::new(settings.sink_timeout());
    mux.push(Box::new(ConsoleNotifier));
    let sink_client = reqwest::Client::new();
    if let Some((token, channel)) = settings.slack() {
        mux.push(Box::new(SlackNotifier::new(
            sink_client.clone(),
            settings.slack_url.clone(),
            token,
            channel,
        )));
    }
    if let Some((url, key)) = settings.grafana() {
        mux.push(Box::new(GrafanaNotifier::new(sink_client, url, key)));
    }

    let mut poller = Poller::new(settings.poll_every(), mux);
    poller.add_source(WatermarkedSource::with_lookback(
        Box::new(InfraEventsProvider::new(
            feed_client.clone(),
            settings.infra_url.clone(),
            creds.clone(),
            account.clone(),
        )),
        lookback,
    ));
    poller.add_source(WatermarkedSource::with_lookback(
        Box::new(AuditTrailProvider::new(
            feed_client.clone(),
            settings.api_url.clone(),
            creds.clone(),
            account.clone(),
        )),
        lookback,
    ));
    match account {
        Some(caid) => poller.add_source(WatermarkedSource::with_lookback(
            Box::new(BillingProvider::new(
                feed_client,
                settings.api_url.clone(),
                creds,
                caid,
                BillingRule {
                    threshold: settings.billing_threshold,
                },
                settings.billing_window(),
            )),
            lookback,
        )),
        None => tracing::info!("billing feed disabled (no IMPERVA_ACCOUNT_ID)"),
    }

    Ok(poller)
}
