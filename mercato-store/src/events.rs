//! Kafka transport for marketplace events. Compiled only with the `kafka`
//! feature; without it the API logs events instead.

#[cfg(feature = "kafka")]
mod kafka {
    use async_trait::async_trait;
    use mercato_core::NotificationSink;
    use mercato_shared::events::MarketplaceEvent;
    use rdkafka::config::ClientConfig;
    use rdkafka::producer::{FutureProducer, FutureRecord};
    use rdkafka::util::Timeout;
    use std::time::Duration;
    use tracing::{error, info};

    #[derive(Clone)]
    pub struct KafkaNotificationSink {
        producer: FutureProducer,
        topic: String,
    }

    impl KafkaNotificationSink {
        pub fn new(brokers: &str, topic: impl Into<String>) -> Result<Self, rdkafka::error::KafkaError> {
            let producer: FutureProducer = ClientConfig::new()
                .set("bootstrap.servers", brokers)
                .set("message.timeout.ms", "5000")
                .create()?;

            Ok(Self { producer, topic: topic.into() })
        }
    }

    #[async_trait]
    impl NotificationSink for KafkaNotificationSink {
        async fn publish(&self, event: &MarketplaceEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            let key = event.key();
            let payload = serde_json::to_string(event)?;
            let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);

            match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
                Ok(delivery) => {
                    info!(
                        "Sent event to {}/{}: partition {} offset {}",
                        self.topic, key, delivery.partition, delivery.offset
                    );
                    Ok(())
                }
                Err((e, _msg)) => {
                    error!("Failed to send event to {}: {}", self.topic, e);
                    Err(Box::new(e))
                }
            }
        }
    }
}

#[cfg(feature = "kafka")]
pub use kafka::KafkaNotificationSink;
