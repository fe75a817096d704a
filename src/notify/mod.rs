// src/notify/mod.rs
pub mod console;
pub mod grafana;
pub mod slack;

pub use console::ConsoleNotifier;
pub use grafana::GrafanaNotifier;
pub use slack::SlackNotifier;

use metrics::counter;
use std::time::Duration;

use crate::error::SinkError;
use crate::event::Event;

/// A delivery target. `Ok(Some(bytes))` carries the raw response for debug logs.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, ev: &Event) -> Result<Option<Vec<u8>>, SinkError>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub failed: usize,
}

impl DeliveryReport {
    pub fn merge(&mut self, other: DeliveryReport) {
        self.attempted += other.attempted;
        self.failed += other.failed;
    }
}

/// Fans events out to every registered sink in registration order.
pub struct NotifierMux {
    sinks: Vec<Box<dyn Notifier>>,
    timeout: Duration,
}

impl Default for NotifierMux {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl NotifierMux {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sinks: Vec::new(),
            timeout,
        }
    }

    pub fn push(&mut self, sink: Box<dyn Notifier>) {
        tracing::info!(target: "notify", sink = sink.name(), "sink enabled");
        self.sinks.push(sink);
    }

    pub fn with(mut self, sink: Box<dyn Notifier>) -> Self {
        self.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Deliver one event to every sink. A failing or slow sink is logged and
    /// never prevents the next one from being tried.
    pub async fn notify(&self, ev: &Event) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for sink in &self.sinks {
            let name = sink.name();
            report.attempted += 1;
            counter!("sink_deliveries_total", "sink" => name).increment(1);

            let outcome = match tokio::time::timeout(self.timeout, sink.send(ev)).await {
                Ok(res) => res,
                Err(_) => Err(SinkError::Timeout {
                    sink: name,
                    after: self.timeout,
                }),
            };

            match outcome {
                Ok(Some(ack)) if !ack.is_empty() => {
                    tracing::debug!(
                        target: "notify",
                        sink = name,
                        response = %String::from_utf8_lossy(&ack),
                        "delivered"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    report.failed += 1;
                    counter!("sink_failures_total", "sink" => name).increment(1);
                    tracing::error!(target: "notify", sink = name, error = %e, "failed to send event");
                }
            }
        }
        report
    }

    /// Event-major fan-out: every event reaches every sink.
    pub async fn notify_all(&self, events: &[Event]) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for ev in events {
            report.merge(self.notify(ev).await);
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Notifier for Counting {
        async fn send(&self, _ev: &Event) -> Result<Option<Vec<u8>>, SinkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SinkError::Rejected {
                    sink: "counting",
                    message: "nope".into(),
                });
            }
            Ok(Some(b"ok".to_vec()))
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    struct Stuck;

    #[async_trait::async_trait]
    impl Notifier for Stuck {
        async fn send(&self, _ev: &Event) -> Result<Option<Vec<u8>>, SinkError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }

        fn name(&self) -> &'static str {
            "stuck"
        }
    }

    fn ev(n: u32) -> Event {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, n).unwrap();
        Event::new(ts, "Test", format!("event {n}"))
    }

    #[tokio::test]
    async fn every_event_reaches_every_sink_despite_failures() {
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        let c = Arc::new(AtomicUsize::new(0));
        let mux = NotifierMux::default()
            .with(Box::new(Counting { calls: a.clone(), fail: false }))
            .with(Box::new(Counting { calls: b.clone(), fail: true }))
            .with(Box::new(Counting { calls: c.clone(), fail: false }));

        let report = mux.notify_all(&[ev(1), ev(2), ev(3)]).await;
        assert_eq!(report.attempted, 9);
        assert_eq!(report.failed, 3);
        for calls in [a, b, c] {
            assert_eq!(calls.load(Ordering::SeqCst), 3);
        }
    }

    #[tokio::test]
    async fn slow_sink_times_out_and_next_sink_still_runs() {
        let after = Arc::new(AtomicUsize::new(0));
        let mux = NotifierMux::new(Duration::from_millis(50))
            .with(Box::new(Stuck))
            .with(Box::new(Counting { calls: after.clone(), fail: false }));

        let report = mux.notify(&ev(1)).await;
        assert_eq!(report, DeliveryReport { attempted: 2, failed: 1 });
        assert_eq!(after.load(Ordering::SeqCst), 1);
    }
}
