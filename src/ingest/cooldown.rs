// src/ingest/cooldown.rs
use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// Secondary watermark for slow-changing feeds.
/// - First check always allowed.
/// - After an emission, checks are suppressed until the window elapses.
/// - State only moves via `record_emit`, never on a quiet check.
#[derive(Debug, Clone, Default)]
pub struct Cooldown {
    window: ChronoDuration,
    last_emit: Option<DateTime<Utc>>,
}

impl Cooldown {
    /// A negative window is treated as zero (no cooldown).
    pub fn new(window: ChronoDuration) -> Self {
        Self {
            window: window.max(ChronoDuration::zero()),
            last_emit: None,
        }
    }

    /// May the feed be queried at `now`? Does NOT mutate state.
    pub fn should_check(&self, now: DateTime<Utc>) -> bool {
        match self.last_emit {
            None => true,
            Some(ts) => now.signed_duration_since(ts) >= self.window,
        }
    }

    pub fn record_emit(&mut self, now: DateTime<Utc>) {
        self.last_emit = Some(now);
    }
}
