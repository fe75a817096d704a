// src/ingest/types.rs
use chrono::{DateTime, Utc};

use crate::error::FeedError;
use crate::event::Event;

/// Result of one fetch: events strictly newer than the input watermark and
/// the watermark to adopt afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub events: Vec<Event>,
    pub watermark: DateTime<Utc>,
}

impl Batch {
    pub fn empty(watermark: DateTime<Utc>) -> Self {
        Self {
            events: Vec::new(),
            watermark,
        }
    }
}

/// One external feed. Implementations do a single request per call and must
/// not return events at or below `watermark`.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_since(&self, watermark: DateTime<Utc>) -> Result<Batch, FeedError>;
    fn name(&self) -> &'static str;
}
