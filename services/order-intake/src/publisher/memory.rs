use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use intake_types::errors::PublishError;
use intake_types::events::OrderAcceptedEvent;

use super::OrderPublisher;

/// Records published events in memory, with a failure switch for tests.
pub struct InMemoryPublisher {
    topic: String,
    published: Mutex<Vec<(String, OrderAcceptedEvent)>>,
    fail_publish: AtomicBool,
    reachable: AtomicBool,
    publish_delay_ms: AtomicU64,
    publish_calls: AtomicUsize,
}

impl InMemoryPublisher {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            published: Mutex::new(Vec::new()),
            fail_publish: AtomicBool::new(false),
            reachable: AtomicBool::new(true),
            publish_delay_ms: AtomicU64::new(0),
            publish_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Delay applied before every publish completes, success or failure
    pub fn set_publish_delay(&self, delay: Duration) {
        self.publish_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Publish attempts, including failed ones
    pub fn publish_calls(&self) -> usize {
        self.publish_calls.load(Ordering::SeqCst)
    }

    /// Successfully published events with their message keys
    pub fn published(&self) -> Vec<(String, OrderAcceptedEvent)> {
        match self.published.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl OrderPublisher for InMemoryPublisher {
    async fn publish_order_accepted(&self, event: &OrderAcceptedEvent) -> Result<(), PublishError> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.publish_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(PublishError::Delivery {
                topic: self.topic.clone(),
                reason: "injected publish failure".to_string(),
            });
        }

        let mut events = self
            .published
            .lock()
            .map_err(|_| PublishError::Unavailable {
                reason: "publisher state poisoned".to_string(),
            })?;
        events.push((event.partition_key(), event.clone()));
        Ok(())
    }

    async fn ping(&self, _timeout: Duration) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use intake_types::order::{PendingOrder, Side};
    use rust_decimal::Decimal;

    fn event() -> OrderAcceptedEvent {
        let order = PendingOrder::new("BTCUSDT", Side::Buy, Decimal::ONE, Decimal::ONE, None);
        OrderAcceptedEvent::from_order(&order, Utc::now())
    }

    #[tokio::test]
    async fn test_publish_records_event_under_order_key() {
        let publisher = InMemoryPublisher::new("orders.in");
        let event = event();
        publisher.publish_order_accepted(&event).await.unwrap();

        let published = publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, event.order_id.to_string());
        assert_eq!(published[0].1, event);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let publisher = InMemoryPublisher::new("orders.in");
        publisher.set_fail_publish(true);
        let err = publisher.publish_order_accepted(&event()).await.unwrap_err();
        assert!(matches!(err, PublishError::Delivery { ref topic, .. } if topic == "orders.in"));
        assert!(publisher.published().is_empty());
        assert_eq!(publisher.publish_calls(), 1);
    }

    #[tokio::test]
    async fn test_publish_delay() {
        let publisher = InMemoryPublisher::new("orders.in");
        publisher.set_publish_delay(Duration::from_millis(30));
        let started = std::time::Instant::now();
        publisher.publish_order_accepted(&event()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(30));
    }
}
