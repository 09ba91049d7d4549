use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_store::config::AppConfig;
use order_store::messaging::OrderProducer;
use order_store::synthetic::random_order;

/// Publish a batch of synthetic orders to the order feed.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_store=debug")),
        )
        .init();

    let config = AppConfig::load()?.publisher;
    tracing::info!(
        broker = %config.broker,
        topic = %config.topic,
        count = config.count,
        "📤 Publishing synthetic orders"
    );

    let producer = OrderProducer::new(&config.broker, &config.topic)?;

    let mut published = 0;
    for _ in 0..config.count {
        let order = random_order(&mut rand::thread_rng());
        match producer.publish(&order).await {
            Ok(()) => published += 1,
            Err(e) => tracing::error!(order_uid = %order.order_uid, error = %e, "Publish failed"),
        }
    }

    tracing::info!(published = published, requested = config.count, "✅ Done");
    Ok(())
}
