use std::time::Duration;

use async_trait::async_trait;
use intake_types::errors::PublishError;
use intake_types::events::OrderAcceptedEvent;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;

use super::OrderPublisher;

const EVENT_TYPE: &str = "order_accepted";

/// Kafka-compatible publisher for order-accepted events.
///
/// Producer defaults favour durability over latency: `acks=all`, idempotent
/// producer, short linger. Delivery is bounded by `message.timeout.ms`.
///
/// ```no_run
/// use order_intake::publisher::KafkaPublisher;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let publisher = KafkaPublisher::builder()
///     .brokers("k1:9092,k2:9092")
///     .topic("orders.in")
///     .timeout(Duration::from_secs(3))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct KafkaPublisher {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

impl KafkaPublisher {
    #[must_use]
    pub fn builder() -> KafkaPublisherBuilder {
        KafkaPublisherBuilder::default()
    }

    /// Wait for in-flight messages before shutdown
    pub fn flush(&self, timeout: Duration) {
        if let Err(e) = self.producer.flush(Timeout::After(timeout)) {
            tracing::warn!(error = %e, "Producer flush incomplete");
        }
    }
}

#[derive(Default)]
pub struct KafkaPublisherBuilder {
    brokers: Option<String>,
    topic: Option<String>,
    timeout: Option<Duration>,
}

impl KafkaPublisherBuilder {
    /// Comma separated bootstrap servers
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Default: `orders.in`
    #[must_use]
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Delivery timeout. Default: 3 seconds
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<KafkaPublisher, PublishError> {
        let brokers = self.brokers.ok_or_else(|| PublishError::Unavailable {
            reason: "brokers not configured".to_string(),
        })?;
        let topic = self.topic.unwrap_or_else(|| "orders.in".to_string());
        let timeout = self.timeout.unwrap_or(Duration::from_secs(3));

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("linger.ms", "5")
            .set("batch.num.messages", "100")
            .set("message.timeout.ms", timeout.as_millis().to_string())
            .create()
            .map_err(|e| PublishError::Unavailable {
                reason: format!("failed to create producer: {e}"),
            })?;

        tracing::info!(
            brokers = %brokers,
            topic = %topic,
            timeout_ms = timeout.as_millis() as u64,
            "Kafka publisher created"
        );

        Ok(KafkaPublisher {
            producer,
            topic,
            timeout,
        })
    }
}

#[async_trait]
impl OrderPublisher for KafkaPublisher {
    async fn publish_order_accepted(&self, event: &OrderAcceptedEvent) -> Result<(), PublishError> {
        let payload = event.to_json().map_err(|e| PublishError::Serialization {
            reason: e.to_string(),
        })?;
        let key = event.partition_key();

        let headers = OwnedHeaders::new().insert(Header {
            key: "event_type",
            value: Some(EVENT_TYPE),
        });
        let record = FutureRecord::to(&self.topic)
            .payload(&payload)
            .key(&key)
            .headers(headers);

        match self.producer.send(record, Timeout::After(self.timeout)).await {
            Ok((partition, offset)) => {
                tracing::debug!(
                    topic = %self.topic,
                    partition,
                    offset,
                    order_id = %event.order_id,
                    "Order event published"
                );
                Ok(())
            }
            Err((kafka_error, _)) => {
                tracing::error!(
                    topic = %self.topic,
                    order_id = %event.order_id,
                    error = %kafka_error,
                    "Failed to publish order event"
                );
                Err(PublishError::Delivery {
                    topic: self.topic.clone(),
                    reason: kafka_error.to_string(),
                })
            }
        }
    }

    async fn ping(&self, timeout: Duration) -> bool {
        // Metadata fetch blocks the calling thread
        let producer = self.producer.clone();
        let topic = self.topic.clone();
        let metadata = tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(Some(&topic), Timeout::After(timeout))
                .is_ok()
        });
        matches!(tokio::time::timeout(timeout, metadata).await, Ok(Ok(true)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kafka_publisher_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<KafkaPublisher>();
        assert_sync::<KafkaPublisher>();
    }

    #[test]
    fn builder_requires_brokers() {
        let err = KafkaPublisher::builder().topic("orders.in").build().err();
        assert!(matches!(err, Some(PublishError::Unavailable { .. })));
    }
}
