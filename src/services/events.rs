use std::sync::Arc;

use tokio::sync::mpsc;

use crate::models::BookingEvent;
use crate::services::notify::Notifier;
use crate::state::AppState;

/// Fan a committed event out to live subscribers and queue it for the
/// notifier. Delivery problems are logged and never affect the mutation.
pub fn publish(state: &Arc<AppState>, event: BookingEvent) {
    // Ignore if no receivers
    let _ = state.events_tx.send(event.clone());

    if let Err(e) = state.notify_tx.try_send(event) {
        let event = match e {
            mpsc::error::TrySendError::Full(event) | mpsc::error::TrySendError::Closed(event) => {
                event
            }
        };
        tracing::warn!(
            event_id = event.id,
            booking_id = %event.booking_id,
            "notification queue unavailable, dropping event"
        );
    }
}

/// Delivers queued events one at a time, in commit order.
pub async fn relay(mut rx: mpsc::Receiver<BookingEvent>, notifier: Box<dyn Notifier>) {
    while let Some(event) = rx.recv().await {
        if let Err(e) = notifier.notify(&event).await {
            tracing::warn!(
                error = %e,
                event_id = event.id,
                booking_id = %event.booking_id,
                "failed to deliver booking notification"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    struct Recording {
        seen: Arc<Mutex<Vec<i64>>>,
        fail_on: i64,
    }

    #[async_trait]
    impl Notifier for Recording {
        async fn notify(&self, event: &BookingEvent) -> anyhow::Result<()> {
            // Slower deliveries first, to catch reordering
            tokio::time::sleep(std::time::Duration::from_millis((5 - event.id as u64) * 2)).await;
            self.seen.lock().unwrap().push(event.id);
            if event.id == self.fail_on {
                anyhow::bail!("webhook down");
            }
            Ok(())
        }
    }

    fn event(id: i64) -> BookingEvent {
        BookingEvent {
            id,
            booking_id: "bk-1".to_string(),
            customer_id: "cust-1".to_string(),
            provider_id: "prov-1".to_string(),
            kind: "status_changed".to_string(),
            status: "accepted".to_string(),
            payment_status: "pending".to_string(),
            actor_id: "prov-1".to_string(),
            created_at: "2030-01-01 09:00:00".to_string(),
        }
    }

    #[tokio::test]
    async fn test_relay_keeps_commit_order_past_failures() {
        let seen = Arc::new(Mutex::new(vec![]));
        let notifier = Recording {
            seen: Arc::clone(&seen),
            fail_on: 2,
        };
        let (tx, rx) = mpsc::channel(8);
        for id in 1..=4 {
            tx.send(event(id)).await.unwrap();
        }
        drop(tx);

        relay(rx, Box::new(notifier)).await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3, 4]);
    }
}
