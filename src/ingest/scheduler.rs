// src/ingest/scheduler.rs
use metrics::{counter, gauge, histogram};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::ingest::watermark::WatermarkedSource;
use crate::notify::{DeliveryReport, NotifierMux};

/// What happened to one feed during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedOutcome {
    pub feed: &'static str,
    /// Number of new events, or the rendered fetch error.
    pub result: Result<usize, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub feeds: Vec<FeedOutcome>,
    pub deliveries: DeliveryReport,
}

impl CycleReport {
    pub fn new_events(&self) -> usize {
        self.feeds
            .iter()
            .filter_map(|f| f.result.as_ref().ok())
            .sum()
    }

    pub fn feed_errors(&self) -> usize {
        self.feeds.iter().filter(|f| f.result.is_err()).count()
    }
}

/// Owns the feeds, the sinks and the tick period. One cycle at a time.
pub struct Poller {
    sources: Vec<WatermarkedSource>,
    mux: NotifierMux,
    interval: Duration,
}

impl Poller {
    pub fn new(interval: Duration, mux: NotifierMux) -> Self {
        Self {
            sources: Vec::new(),
            mux,
            interval,
        }
    }

    /// Sources are polled in the order they are added.
    pub fn add_source(&mut self, source: WatermarkedSource) {
        tracing::info!(target: "poller", feed = source.name(), "feed enabled");
        self.sources.push(source);
    }

    pub fn with_source(mut self, source: WatermarkedSource) -> Self {
        self.add_source(source);
        self
    }

    pub fn sources(&self) -> &[WatermarkedSource] {
        &self.sources
    }

    /// Poll every feed once and fan its new events out to every sink. Errors
    /// are logged and recorded in the report; they never end the cycle.
    pub async fn run_cycle(&self) -> CycleReport {
        crate::ingest::ensure_metrics_described();
        let t0 = std::time::Instant::now();
        let mut report = CycleReport::default();

        for source in &self.sources {
            let feed = source.name();
            match source.poll().await {
                Ok(events) => {
                    counter!("feed_events_total", "feed" => feed).increment(events.len() as u64);
                    gauge!("feed_watermark_ts", "feed" => feed)
                        .set(source.watermark().await.timestamp() as f64);
                    if !events.is_empty() {
                        tracing::debug!(target: "poller", feed, count = events.len(), "new events");
                    }
                    report.deliveries.merge(self.mux.notify_all(&events).await);
                    report.feeds.push(FeedOutcome {
                        feed,
                        result: Ok(events.len()),
                    });
                }
                Err(e) => {
                    counter!("feed_errors_total", "feed" => feed).increment(1);
                    tracing::error!(target: "poller", feed, error = %e, "failed to get new events");
                    report.feeds.push(FeedOutcome {
                        feed,
                        result: Err(e.to_string()),
                    });
                }
            }
        }

        counter!("poll_cycles_total").increment(1);
        histogram!("poll_cycle_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        tracing::debug!(
            target: "poller",
            new_events = report.new_events(),
            feed_errors = report.feed_errors(),
            delivered = report.deliveries.attempted - report.deliveries.failed,
            failed = report.deliveries.failed,
            "cycle finished"
        );
        report
    }

    /// Tick until `shutdown` resolves. The first tick fires one interval after
    /// start; a cycle that overruns delays the next tick instead of stacking.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        tracing::info!(
            target: "poller",
            interval_secs = self.interval.as_secs_f64(),
            feeds = self.sources.len(),
            sinks = self.mux.len(),
            "poller started"
        );
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(target: "poller", "poller stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
            }
        }
    }

    /// Run forever on a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run_until(std::future::pending()).await })
    }
}
