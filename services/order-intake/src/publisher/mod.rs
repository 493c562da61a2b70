//! Broker-facing publisher of order-accepted events

use std::time::Duration;

use async_trait::async_trait;
use intake_types::errors::PublishError;
use intake_types::events::OrderAcceptedEvent;

#[cfg(feature = "kafka")]
mod kafka;
mod memory;

#[cfg(feature = "kafka")]
pub use kafka::{KafkaPublisher, KafkaPublisherBuilder};
pub use memory::InMemoryPublisher;

#[async_trait]
pub trait OrderPublisher: Send + Sync {
    /// Deliver one event, keyed by its order id. No retries happen here.
    async fn publish_order_accepted(&self, event: &OrderAcceptedEvent) -> Result<(), PublishError>;

    /// Side-effect free reachability check, bounded by `timeout`.
    async fn ping(&self, timeout: Duration) -> bool;
}
