use reqwest::Client;
use serde::Serialize;

use super::Notifier;
use crate::error::SinkError;
use crate::event::Event;

const SINK: &str = "grafana";

/// Writes each event as a zero-length Grafana annotation.
#[derive(Clone)]
pub struct GrafanaNotifier {
    base_url: String,
    api_key: String,
    tags: Vec<String>,
    client: Client,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct AnnotationPayload {
    time: i64,
    time_end: i64,
    tags: Vec<String>,
    text: String,
}

impl AnnotationPayload {
    fn for_event(ev: &Event, tags: &[String]) -> Self {
        let ms = ev.timestamp().timestamp_millis();
        Self {
            time: ms,
            time_end: ms,
            tags: tags.to_vec(),
            text: ev.body().to_string(),
        }
    }
}

impl GrafanaNotifier {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: String) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            tags: vec!["imperva".to_string()],
            client,
        }
    }
}

#[async_trait::async_trait]
impl Notifier for GrafanaNotifier {
    async fn send(&self, ev: &Event) -> Result<Option<Vec<u8>>, SinkError> {
        let payload = AnnotationPayload::for_event(ev, &self.tags);
        let rsp = self
            .client
            .post(format!("{}/api/annotations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|source| SinkError::Transport { sink: SINK, source })?;
        let status = rsp.status();
        let bytes = rsp
            .bytes()
            .await
            .map_err(|source| SinkError::Transport { sink: SINK, source })?;
        if !status.is_success() {
            return Err(SinkError::Rejected {
                sink: SINK,
                message: format!("HTTP {status}: {}", String::from_utf8_lossy(&bytes).trim()),
            });
        }
        Ok(Some(bytes.to_vec()))
    }

    fn name(&self) -> &'static str {
        SINK
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn annotation_is_zero_length_at_event_time() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let ev = Event::new(ts, "Audit", "Login by ops");
        let p = AnnotationPayload::for_event(&ev, &["imperva".to_string()]);
        assert_eq!(p.time, 1_714_564_800_000);
        assert_eq!(p.time, p.time_end);

        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["timeEnd"], 1_714_564_800_000i64);
        assert_eq!(v["tags"][0], "imperva");
        assert_eq!(v["text"], "Login by ops");
    }
}
