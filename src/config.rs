// src/config.rs
//! Command-line flags with `IMPERVA_*` environment fallbacks.
//!
//! `.env` is loaded by the binary before parsing, so every option can come
//! from a flag, the process environment, or a dotenv file (in that order).

use chrono::Duration as ChronoDuration;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::ingest::ApiCredentials;

pub const DEFAULT_INFRA_URL: &str = "https://my.imperva.com";
pub const DEFAULT_API_URL: &str = "https://api.imperva.com";
pub const DEFAULT_SLACK_URL: &str = "https://slack.com/api";

/// One day; longer periods overflow the timer deadline.
pub const MAX_POLL_INTERVAL_SECS: u64 = 86_400;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "imperva-events",
    about = "Scrape Imperva security events and forward new ones to Slack/Grafana",
    version
)]
pub struct Settings {
    /// Imperva API ID
    #[arg(long, env = "IMPERVA_API_ID")]
    pub api_id: Option<String>,

    /// Imperva API token
    #[arg(long, env = "IMPERVA_API_TOKEN", hide_env_values = true)]
    pub api_token: Option<String>,

    /// Imperva account ID (enables the billing feed)
    #[arg(long, env = "IMPERVA_ACCOUNT_ID")]
    pub account_id: Option<String>,

    /// Enable debug logging
    #[arg(long, env = "IMPERVA_DEBUG")]
    pub debug: bool,

    /// Emit JSON log lines
    #[arg(long, env = "IMPERVA_LOG_JSON")]
    pub log_json: bool,

    #[arg(long, env = "IMPERVA_SLACK_TOKEN", hide_env_values = true)]
    pub slack_token: Option<String>,

    #[arg(long, env = "IMPERVA_SLACK_CHANNEL")]
    pub slack_channel: Option<String>,

    #[arg(long, env = "IMPERVA_GRAFANA_URL")]
    pub grafana_url: Option<String>,

    #[arg(long, env = "IMPERVA_GRAFANA_API_KEY", hide_env_values = true)]
    pub grafana_api_key: Option<String>,

    /// Poll interval (seconds)
    #[arg(long, env = "IMPERVA_POLL_INTERVAL", default_value_t = 10)]
    pub poll_interval: u64,

    /// Lookback applied to the first poll (minutes)
    #[arg(long, env = "IMPERVA_INIT_INTERVAL", default_value_t = 600)]
    pub init_interval: u64,

    /// Quiet period after a billing alert (minutes)
    #[arg(long, env = "IMPERVA_BILLING_WINDOW", default_value_t = 60)]
    pub billing_window: u64,

    /// Usage ratio an open billing record must exceed
    #[arg(long, env = "IMPERVA_BILLING_THRESHOLD", default_value_t = 0.9)]
    pub billing_threshold: f64,

    /// Per-sink delivery timeout (seconds)
    #[arg(long, env = "IMPERVA_SINK_TIMEOUT", default_value_t = 10)]
    pub sink_timeout: u64,

    #[arg(long, env = "IMPERVA_INFRA_URL", default_value = DEFAULT_INFRA_URL)]
    pub infra_url: String,

    #[arg(long, env = "IMPERVA_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    #[arg(long, env = "IMPERVA_SLACK_URL", default_value = DEFAULT_SLACK_URL)]
    pub slack_url: String,

    /// Serve Prometheus metrics on this address, e.g. 0.0.0.0:9102
    #[arg(long, env = "IMPERVA_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl Settings {
    /// Reject settings the poller cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.credentials()?;
        if self.poll_interval == 0 || self.poll_interval > MAX_POLL_INTERVAL_SECS {
            return Err(ConfigError::Invalid {
                name: "poll-interval",
                reason: format!("must be between 1 and {MAX_POLL_INTERVAL_SECS} seconds"),
            });
        }
        if self.sink_timeout == 0 {
            return Err(ConfigError::Invalid {
                name: "sink-timeout",
                reason: "must be greater than zero".into(),
            });
        }
        if !self.billing_threshold.is_finite() || self.billing_threshold < 0.0 {
            return Err(ConfigError::Invalid {
                name: "billing-threshold",
                reason: format!("{} is not a usable ratio", self.billing_threshold),
            });
        }
        Ok(())
    }

    pub fn credentials(&self) -> Result<ApiCredentials, ConfigError> {
        let id = non_empty(&self.api_id).ok_or(ConfigError::Missing("IMPERVA_API_ID"))?;
        let token = non_empty(&self.api_token).ok_or(ConfigError::Missing("IMPERVA_API_TOKEN"))?;
        Ok(ApiCredentials::new(id, token))
    }

    pub fn account_id(&self) -> Option<String> {
        non_empty(&self.account_id).map(str::to_string)
    }

    /// Token and channel, only when both are set.
    pub fn slack(&self) -> Option<(String, String)> {
        Some((
            non_empty(&self.slack_token)?.to_string(),
            non_empty(&self.slack_channel)?.to_string(),
        ))
    }

    /// URL and API key, only when both are set.
    pub fn grafana(&self) -> Option<(String, String)> {
        Some((
            non_empty(&self.grafana_url)?.to_string(),
            non_empty(&self.grafana_api_key)?.to_string(),
        ))
    }

    pub fn poll_every(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn lookback(&self) -> ChronoDuration {
        ChronoDuration::minutes(self.init_interval.min(i64::MAX as u64 / 60_000) as i64)
    }

    pub fn billing_window(&self) -> ChronoDuration {
        ChronoDuration::minutes(self.billing_window.min(i64::MAX as u64 / 60_000) as i64)
    }

    pub fn sink_timeout(&self) -> Duration {
        Duration::from_secs(self.sink_timeout)
    }
}
