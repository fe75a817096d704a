// src/ingest/providers/billing.rs
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::FeedError;
use crate::event::Event;
use crate::ingest::cooldown::Cooldown;
use crate::ingest::types::{Batch, FeedSource};
use crate::ingest::watermark::select_newer;
use crate::ingest::{fetch_json, ApiCredentials};

const FEED: &str = "billing";
const SUMMARY_PATH: &str = "/usage-report/api/v1/billing-summary";

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BillingRecord {
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    usage: f64,
    #[serde(default)]
    purchased_quantity: f64,
    #[serde(default)]
    unit: String,
    #[serde(default)]
    month: String,
}

#[derive(Debug, Deserialize)]
struct BillingSummaryResponse {
    #[serde(default)]
    data: Vec<BillingRecord>,
}

/// Alert when an open record's usage ratio strictly exceeds `threshold`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BillingRule {
    pub threshold: f64,
}

impl Default for BillingRule {
    fn default() -> Self {
        Self { threshold: 0.9 }
    }
}

impl BillingRule {
    pub fn triggers(&self, status: &str, usage: f64, purchased: f64) -> bool {
        if !status.trim().eq_ignore_ascii_case("open") || purchased <= 0.0 {
            return false;
        }
        usage / purchased > self.threshold
    }
}

impl BillingRecord {
    fn ratio(&self) -> f64 {
        if self.purchased_quantity > 0.0 {
            self.usage / self.purchased_quantity
        } else {
            0.0
        }
    }

    fn to_event(&self, checked_at: DateTime<Utc>) -> Event {
        let body = format!(
            "{}: {}/{} {} used ({:.0}%) in {}",
            self.name,
            self.usage,
            self.purchased_quantity,
            self.unit,
            self.ratio() * 100.0,
            self.month
        );
        Event::new(checked_at, "Billing", body)
    }
}

/// Monthly billing summary. Records carry no event time, so emitted events are
/// stamped with the check time, and a cooldown keeps the feed from being asked
/// again until the window after an alert has passed.
pub struct BillingProvider {
    client: reqwest::Client,
    base_url: String,
    creds: ApiCredentials,
    account_id: String,
    rule: BillingRule,
    cooldown: Mutex<Cooldown>,
    clock: Clock,
}

impl BillingProvider {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        creds: ApiCredentials,
        account_id: impl Into<String>,
        rule: BillingRule,
        window: ChronoDuration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            creds,
            account_id: account_id.into(),
            rule,
            cooldown: Mutex::new(Cooldown::new(window)),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn month_range(now: DateTime<Utc>) -> (String, String) {
        let today = now.date_naive();
        let first = today.with_day(1).unwrap_or(today);
        (
            first.format("%Y-%m-%d").to_string(),
            today.format("%Y-%m-%d").to_string(),
        )
    }
}

#[async_trait]
impl FeedSource for BillingProvider {
    async fn fetch_since(&self, watermark: DateTime<Utc>) -> Result<Batch, FeedError> {
        let now = (self.clock)();
        if !self.cooldown.lock().await.should_check(now) {
            tracing::debug!(target: "ingest", feed = FEED, "billing check inside cooldown, skipped");
            return Ok(Batch::empty(watermark));
        }

        let (from, to) = Self::month_range(now);
        let url = format!("{}{}", self.base_url, SUMMARY_PATH);
        let req = self.creds.apply(self.client.get(url)).query(&[
            ("caid", self.account_id.as_str()),
            ("from", from.as_str()),
            ("to", to.as_str()),
        ]);
        let resp: BillingSummaryResponse = fetch_json(FEED, req).await?;

        let events = resp
            .data
            .iter()
            .filter(|r| self.rule.triggers(&r.status, r.usage, r.purchased_quantity))
            .map(|r| r.to_event(now))
            .collect();
        let batch = select_newer(watermark, events);
        if !batch.events.is_empty() {
            self.cooldown.lock().await.record_emit(now);
        }
        Ok(batch)
    }

    fn name(&self) -> &'static str {
        FEED
    }
}
