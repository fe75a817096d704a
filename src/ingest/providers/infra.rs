// src/ingest/providers/infra.rs
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::error::FeedError;
use crate::event::Event;
use crate::ingest::types::{Batch, FeedSource};
use crate::ingest::watermark::select_newer;
use crate::ingest::{fetch_json, ApiCredentials};

const FEED: &str = "infra";
const EVENTS_PATH: &str = "/api/v1/infra/events";
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InfraEvent {
    #[serde(default)]
    event_time: String,
    #[serde(default)]
    event_type: String,
    #[serde(default)]
    event_target: String,
    #[serde(default)]
    reported_by_pop: String,
}

#[derive(Debug, Deserialize)]
struct InfraEventsResponse {
    #[serde(default)]
    events: Vec<InfraEvent>,
    #[serde(default)]
    res: i64,
    #[serde(default)]
    res_message: String,
}

/// `"2024-05-01 12:00:00 UTC"`; anything else maps to the epoch with a warning.
pub fn parse_event_time(raw: &str) -> DateTime<Utc> {
    match NaiveDateTime::parse_from_str(raw.trim(), TIME_FORMAT) {
        Ok(naive) => naive.and_utc(),
        Err(e) => {
            tracing::warn!(target: "ingest", feed = FEED, raw, error = %e, "unparsable event time");
            DateTime::<Utc>::UNIX_EPOCH
        }
    }
}

impl InfraEvent {
    fn into_event(self) -> Event {
        let body = format!(
            "{} {} (POP: {})",
            self.event_type, self.event_target, self.reported_by_pop
        );
        Event::new(parse_event_time(&self.event_time), "Infra", body)
    }
}

/// Infrastructure protection events (DDoS start/stop etc.) from my.imperva.com.
pub struct InfraEventsProvider {
    client: reqwest::Client,
    base_url: String,
    creds: ApiCredentials,
    account_id: Option<String>,
}

impl InfraEventsProvider {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        creds: ApiCredentials,
        account_id: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            creds,
            account_id,
        }
    }

    fn to_batch(watermark: DateTime<Utc>, resp: InfraEventsResponse) -> Result<Batch, FeedError> {
        if resp.res != 0 {
            return Err(FeedError::Feed {
                feed: FEED,
                status: 200,
                message: format!("res={} {}", resp.res, resp.res_message),
            });
        }
        let events = resp.events.into_iter().map(InfraEvent::into_event).collect();
        Ok(select_newer(watermark, events))
    }
}

#[async_trait]
impl FeedSource for InfraEventsProvider {
    async fn fetch_since(&self, watermark: DateTime<Utc>) -> Result<Batch, FeedError> {
        let url = format!("{}{}", self.base_url, EVENTS_PATH);
        let mut req = self.creds.apply(self.client.post(url));
        if let Some(account) = &self.account_id {
            req = req.query(&[("account_id", account.as_str())]);
        }
        let resp: InfraEventsResponse = fetch_json(FEED, req).await?;
        Self::to_batch(watermark, resp)
    }

    fn name(&self) -> &'static str {
        FEED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};

    #[test]
    fn parses_vendor_time_format() {
        let t = parse_event_time("2024-05-01 12:00:05 UTC");
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 5).unwrap());
    }

    #[test]
    fn bad_time_maps_to_epoch() {
        assert_eq!(parse_event_time("yesterday"), DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(parse_event_time(""), DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn out_of_order_items_take_true_max() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let body = r#"{
            "events": [
                {"eventTime":"2024-05-01 12:00:20 UTC","eventType":"DDOS_STOP_IP_RANGE","eventTarget":"1.2.3.0/24","reportedByPop":"ams"},
                {"eventTime":"2024-05-01 11:59:50 UTC","eventType":"DDOS_START_IP_RANGE","eventTarget":"1.2.3.0/24","reportedByPop":"ams"},
                {"eventTime":"garbage","eventType":"X","eventTarget":"Y","reportedByPop":"Z"},
                {"eventTime":"2024-05-01 12:00:05 UTC","eventType":"DDOS_START_IP_RANGE","eventTarget":"5.6.7.0/24","reportedByPop":"fra"}
            ],
            "res": 0,
            "res_message": "OK"
        }"#;
        let resp: InfraEventsResponse = serde_json::from_str(body).unwrap();
        let batch = InfraEventsProvider::to_batch(t0, resp).unwrap();
        assert_eq!(batch.events.len(), 2);
        assert_eq!(batch.watermark, t0 + ChronoDuration::seconds(20));
        assert_eq!(
            batch.events[1].body(),
            "DDOS_START_IP_RANGE 5.6.7.0/24 (POP: fra)"
        );
        assert!(batch.events.iter().all(|e| e.title() == "Infra"));
    }

    #[test]
    fn nonzero_res_is_feed_error() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let resp: InfraEventsResponse =
            serde_json::from_str(r#"{"res":9403,"res_message":"Unknown/unauthorized account_id"}"#)
                .unwrap();
        let err = InfraEventsProvider::to_batch(t0, resp).unwrap_err();
        assert!(err.to_string().contains("unauthorized account_id"));
    }
}
