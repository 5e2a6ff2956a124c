pub mod webhook;

use async_trait::async_trait;

use crate::models::BookingEvent;

/// Out-of-band delivery of booking events to the other party.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &BookingEvent) -> anyhow::Result<()>;
}

pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, event: &BookingEvent) -> anyhow::Result<()> {
        tracing::debug!(event_id = event.id, kind = event.kind.as_str(), "no notifier configured");
        Ok(())
    }
}
