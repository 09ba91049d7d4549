use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    error::KafkaResult,
    message::{BorrowedMessage, Message},
    Offset,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use validator::Validate;

use crate::config::KafkaConfig;
use crate::metrics::Metrics;
use crate::models::Order;
use crate::service::OrderService;
use crate::utils::{retry_on_transient, RetryConfig, RetryResult};

// ============================================================================
// Order Feed Consumer
// ============================================================================
//
// Delivery is at-least-once: the offset is committed only after the message
// has been fully handled. Handling one message:
//
//   decode JSON -> validate -> ingest_order (retried on transient errors)
//
// Bad payloads and permanent store failures are logged and committed so the
// partition keeps moving. Transient failures that exhaust the retry budget
// are not committed: the consumer pauses, then seeks the partition back to
// the failed offset so the same message is fetched again before anything
// after it. If the seek itself fails the consumer stops rather than let a
// later commit move past the message.
//
// Shutdown is only observed between messages; an ingest in progress always
// runs to completion first.
//
// ============================================================================

/// What happened to one feed message.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    Stored,
    Undecodable,
    Invalid,
    Rejected,
    Deferred,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Stored => "stored",
            Disposition::Undecodable => "undecodable",
            Disposition::Invalid => "invalid",
            Disposition::Rejected => "rejected",
            Disposition::Deferred => "deferred",
        }
    }

    pub fn feed_action(&self) -> FeedAction {
        match self {
            Disposition::Deferred => FeedAction::Rewind,
            _ => FeedAction::Commit,
        }
    }
}

/// What happens to the partition position after a message was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedAction {
    /// Commit past the message.
    Commit,
    /// Seek back to the message so it is consumed again.
    Rewind,
}

/// Handle one raw payload. Kept separate from the Kafka plumbing so the
/// decision logic can be exercised without a broker.
pub async fn handle_payload(
    service: &OrderService,
    payload: &[u8],
    retry_config: RetryConfig,
) -> Disposition {
    let order: Order = match serde_json::from_slice(payload) {
        Ok(order) => order,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to decode order payload");
            return Disposition::Undecodable;
        }
    };

    if let Err(e) = order.validate() {
        tracing::warn!(order_uid = %order.order_uid, error = %e, "Order failed validation");
        return Disposition::Invalid;
    }

    let order_uid = order.order_uid.clone();
    let result = retry_on_transient(retry_config, |attempt| {
        let order = order.clone();
        async move {
            if attempt > 1 {
                tracing::debug!(order_uid = %order.order_uid, attempt = attempt, "Retrying ingest");
            }
            service.ingest_order(order).await
        }
    })
    .await;

    match result {
        RetryResult::Success(()) => Disposition::Stored,
        RetryResult::PermanentFailure(e) => {
            tracing::error!(order_uid = %order_uid, error = %e, "Order rejected by store");
            Disposition::Rejected
        }
        RetryResult::Failed(e) => {
            tracing::error!(
                order_uid = %order_uid,
                error = %e,
                "Order not stored, leaving offset uncommitted"
            );
            Disposition::Deferred
        }
    }
}

pub struct OrderConsumer {
    consumer: StreamConsumer,
    service: Arc<OrderService>,
    metrics: Arc<Metrics>,
    retry_config: RetryConfig,
    redelivery_delay: Duration,
    topic: String,
}

impl OrderConsumer {
    pub fn new(
        config: &KafkaConfig,
        service: Arc<OrderService>,
        metrics: Arc<Metrics>,
    ) -> anyhow::Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.broker)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()?;

        consumer.subscribe(&[config.topic.as_str()])?;

        Ok(Self {
            consumer,
            service,
            metrics,
            retry_config: RetryConfig::aggressive(),
            redelivery_delay: config.redelivery_delay(),
            topic: config.topic.clone(),
        })
    }

    /// Consume until `shutdown` flips to true.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(topic = %self.topic, "Subscribed to order feed");

        loop {
            let message = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                message = self.consumer.recv() => message,
            };

            match message {
                Ok(message) => {
                    if let Err(e) = self.process(&message).await {
                        tracing::error!(
                            partition = message.partition(),
                            offset = message.offset(),
                            error = %e,
                            "Could not rewind to unstored message, stopping consumer"
                        );
                        break;
                    }
                }
                Err(e) => {
                    self.metrics.record_feed_message("receive_error");
                    tracing::warn!(error = %e, "Could not fetch message");
                }
            }
        }

        tracing::info!("Order feed consumer stopped");
    }

    async fn process(&self, message: &BorrowedMessage<'_>) -> KafkaResult<()> {
        let disposition = match message.payload() {
            Some(payload) => {
                handle_payload(&self.service, payload, self.retry_config.clone()).await
            }
            None => {
                tracing::warn!(offset = message.offset(), "Skipping message without payload");
                Disposition::Undecodable
            }
        };

        self.metrics.record_feed_message(disposition.as_str());

        match disposition.feed_action() {
            FeedAction::Commit => {
                match self.consumer.commit_message(message, CommitMode::Async) {
                    Ok(()) => self.metrics.record_feed_message("committed"),
                    Err(e) => tracing::warn!(
                        partition = message.partition(),
                        offset = message.offset(),
                        error = %e,
                        "Failed to commit message"
                    ),
                }
                Ok(())
            }
            FeedAction::Rewind => self.rewind(message).await,
        }
    }

    /// Position the partition back on `message` after a pause.
    async fn rewind(&self, message: &BorrowedMessage<'_>) -> KafkaResult<()> {
        tokio::time::sleep(self.redelivery_delay).await;

        self.consumer.seek(
            message.topic(),
            message.partition(),
            Offset::Offset(message.offset()),
            Duration::from_secs(5),
        )?;

        self.metrics.record_feed_message("rewound");
        tracing::info!(
            partition = message.partition(),
            offset = message.offset(),
            "Rewound partition to unstored message"
        );
        Ok(())
    }
}
