// src/ingest/watermark.rs
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::Mutex;

use crate::error::FeedError;
use crate::event::Event;
use crate::ingest::types::{Batch, FeedSource};

/// Keep events strictly newer than `watermark` and compute the next watermark
/// as the true maximum over the kept ones. Input order does not matter.
pub fn select_newer(watermark: DateTime<Utc>, events: Vec<Event>) -> Batch {
    let mut next = watermark;
    let mut kept = Vec::with_capacity(events.len());
    for ev in events {
        if ev.timestamp() > watermark {
            next = next.max(ev.timestamp());
            kept.push(ev);
        }
    }
    Batch {
        events: kept,
        watermark: next,
    }
}

/// A feed plus the watermark it alone advances.
///
/// The lock spans fetch and advance, so an overlapping poll waits instead of
/// reading a stale watermark.
pub struct WatermarkedSource {
    source: Box<dyn FeedSource>,
    watermark: Mutex<DateTime<Utc>>,
}

impl WatermarkedSource {
    pub fn new(source: Box<dyn FeedSource>, initial: DateTime<Utc>) -> Self {
        Self {
            source,
            watermark: Mutex::new(initial),
        }
    }

    /// Start at `now - lookback` so the first poll is bounded.
    pub fn with_lookback(source: Box<dyn FeedSource>, lookback: ChronoDuration) -> Self {
        let initial = Utc::now()
            .checked_sub_signed(lookback)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Self::new(source, initial)
    }

    pub fn name(&self) -> &'static str {
        self.source.name()
    }

    pub async fn watermark(&self) -> DateTime<Utc> {
        *self.watermark.lock().await
    }

    /// Fetch new events and advance the watermark. On error the watermark is
    /// left untouched so the same interval is queried again next tick.
    pub async fn poll(&self) -> Result<Vec<Event>, FeedError> {
        let mut wm = self.watermark.lock().await;
        let batch = self.source.fetch_since(*wm).await?;
        if batch.watermark > *wm {
            *wm = batch.watermark;
        }
        let current = *wm;
        tracing::debug!(
            target: "ingest",
            feed = self.name(),
            fetched = batch.events.len(),
            watermark = %current,
            "feed polled"
        );
        Ok(batch.events)
    }
}
