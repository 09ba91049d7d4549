use anyhow::Result;
use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord},
    util::Timeout,
};
use std::time::Duration;

use crate::models::Order;

// ============================================================================
// Order Feed Producer
// ============================================================================
//
// Publishes orders as JSON, keyed by order_uid so every message for one
// order lands on the same partition.
//
// ============================================================================

pub struct OrderProducer {
    producer: FutureProducer,
    topic: String,
}

impl OrderProducer {
    pub fn new(brokers: &str, topic: &str) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }

    pub async fn publish(&self, order: &Order) -> Result<()> {
        let payload = serde_json::to_string(order)?;

        let record = FutureRecord::to(&self.topic)
            .key(&order.order_uid)
            .payload(&payload);

        self.producer
            .send(record, Timeout::After(Duration::from_secs(5)))
            .await
            .map_err(|(e, _)| anyhow::anyhow!("Kafka send error: {}", e))?;

        tracing::info!(
            topic = %self.topic,
            order_uid = %order.order_uid,
            "Published order"
        );

        Ok(())
    }
}
