use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_store::config::{AppConfig, StoreBackend};
use order_store::http::start_http_server;
use order_store::messaging::OrderConsumer;
use order_store::metrics::Metrics;
use order_store::service::OrderService;
use order_store::store::{InMemoryOrderRepository, OrderRepository, PgOrderRepository};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO level, override with RUST_LOG
    // Example: RUST_LOG=order_store=trace cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_store=debug")),
        )
        .init();

    tracing::info!("🚀 Starting order store");

    // === 1. Configuration ===
    let config = AppConfig::load()?;
    tracing::info!(
        http_addr = %config.http.addr,
        kafka_broker = %config.kafka.broker,
        kafka_topic = %config.kafka.topic,
        cache_capacity = config.cache.capacity,
        "Configuration loaded"
    );

    // === 2. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!(
        "📊 Metrics registry created with {} metrics",
        metrics.registry().gather().len()
    );

    // === 3. Store ===
    let (repository, pool) = match config.database.backend {
        StoreBackend::Postgres => {
            tracing::info!("Connecting to PostgreSQL...");
            let repository = PgOrderRepository::connect(&config.database).await?;
            let pool = repository.pool().clone();
            tracing::info!("✅ Connected to PostgreSQL");
            (Arc::new(repository) as Arc<dyn OrderRepository>, Some(pool))
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, orders are lost on exit");
            (
                Arc::new(InMemoryOrderRepository::new()) as Arc<dyn OrderRepository>,
                None,
            )
        }
    };

    // === 4. Order service with a warm cache ===
    let service = Arc::new(
        OrderService::bootstrap(
            &config.cache,
            repository,
            metrics.clone(),
        )
        .await?,
    );

    // === 5. Feed consumer ===
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = OrderConsumer::new(&config.kafka, service.clone(), metrics.clone())?;
    let consumer_task = tokio::spawn(consumer.run(shutdown_rx));

    // === 6. HTTP server ===
    let server = start_http_server(&config.http, service.clone(), metrics.clone())?;
    let server_handle = server.handle();
    let server_task = actix_web::rt::spawn(server);

    tracing::info!("✅ Order store running. Press Ctrl+C to stop.");

    tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("🛑 Shutdown signal received");
        }
        result = server_task => {
            match result {
                Ok(Ok(())) => tracing::warn!("HTTP server exited"),
                Ok(Err(e)) => tracing::error!(error = %e, "HTTP server failed"),
                Err(e) => tracing::error!(error = %e, "HTTP server task panicked"),
            }
        }
    }

    // === 7. Graceful shutdown ===
    server_handle.stop(true).await;

    let _ = shutdown_tx.send(true);
    if let Err(e) = consumer_task.await {
        tracing::error!(error = %e, "Consumer task panicked");
    }

    if let Some(pool) = pool {
        pool.close().await;
    }

    tracing::info!("✅ Shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
