use reqwest::Client;
use serde::Deserialize;

use super::Notifier;
use crate::error::SinkError;
use crate::event::Event;

const SINK: &str = "slack";

pub struct SlackNotifier {
    api_url: String,
    token: String,
    channel: String,
    client: Client,
}

#[derive(Deserialize)]
struct SlackResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SlackNotifier {
    pub fn new(client: Client, api_url: impl Into<String>, token: String, channel: String) -> Self {
        Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
            channel,
            client,
        }
    }

    /// `[01 May 24 12:00 UTC] Infra`
    pub fn title_for(ev: &Event) -> String {
        format!(
            "[{}] {}",
            ev.timestamp().format("%d %b %y %H:%M UTC"),
            ev.title()
        )
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, ev: &Event) -> Result<Option<Vec<u8>>, SinkError> {
        let title = Self::title_for(ev);
        let body = serde_json::json!({
            "channel": self.channel,
            "text": title,
            "attachments": [{ "title": title, "text": ev.body() }],
        });

        let rsp = self
            .client
            .post(format!("{}/chat.postMessage", self.api_url))
            .bearer_auth(&self.token)
            .json(&body)
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
                message: format!("HTTP {status}"),
            });
        }
        // Slack reports auth/channel problems with 200 + ok=false.
        let parsed: SlackResponse =
            serde_json::from_slice(&bytes).map_err(|e| SinkError::Rejected {
                sink: SINK,
                message: format!("unreadable response: {e}"),
            })?;
        if !parsed.ok {
            return Err(SinkError::Rejected {
                sink: SINK,
                message: parsed.error.unwrap_or_else(|| "ok=false".to_string()),
            });
        }
        Ok(Some(bytes.to_vec()))
    }

    fn name(&self) -> &'static str {
        SINK
    }
}
