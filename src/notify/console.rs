use super::Notifier;
use crate::error::SinkError;
use crate::event::Event;

/// Logs every event at info level. Always registered, never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

#[async_trait::async_trait]
impl Notifier for ConsoleNotifier {
    async fn send(&self, ev: &Event) -> Result<Option<Vec<u8>>, SinkError> {
        tracing::info!(target: "notify", time = %ev.timestamp().to_rfc3339(), "{ev}");
        Ok(None)
    }

    fn name(&self) -> &'static str {
        "console"
    }
}
