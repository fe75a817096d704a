// src/event.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Normalized notification unit handed from the poller to every sink.
///
/// Fields are private so an event cannot change while it is being fanned out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    #[serde(rename = "time")]
    timestamp: DateTime<Utc>,
    title: String,
    body: String,
}

impl Event {
    pub fn new(timestamp: DateTime<Utc>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            timestamp,
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.body)
    }
}
