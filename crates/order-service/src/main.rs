//! Order service entry point.

use std::sync::Arc;

use common::runtime::{init_tracing, shutdown_signal};
use common::{ConfigError, ORDER_PROCESSED_QUEUE};
use messaging::{AmqpChannel, Backoff, ChannelError, MessageChannel};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use order_service::config::Config;
use order_service::{AppState, InMemoryOrderStore, OrderStore, PostgresOrderStore, StoreError};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;

#[derive(Debug, Error)]
enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("order store error: {0}")]
    Store(#[from] StoreError),

    #[error("broker error: {0}")]
    Broker(#[from] ChannelError),

    #[error("failed to install metrics recorder: {0}")]
    Metrics(#[from] BuildError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    init_tracing("info");

    if let Err(e) = run().await {
        tracing::error!(error = %e, "order service stopped with an error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = Config::from_env()?;
    let metrics_handle = PrometheusBuilder::new().install_recorder()?;

    let channel = Arc::new(AmqpChannel::connect(config.broker.clone()).await?);
    channel.declare_queue(ORDER_PROCESSED_QUEUE).await?;

    if config.uses_memory_store() {
        tracing::warn!("using the in-memory order store, orders are lost on exit");
        serve(config, InMemoryOrderStore::new(), channel, metrics_handle).await
    } else {
        let store = PostgresOrderStore::connect(&config.database_url).await?;
        store.run_migrations().await?;
        serve(config, store, channel, metrics_handle).await
    }
}

async fn serve<S>(
    config: Config,
    store: S,
    channel: Arc<AmqpChannel>,
    metrics_handle: PrometheusHandle,
) -> Result<(), StartupError>
where
    S: OrderStore + Clone + 'static,
{
    let listener = TcpListener::bind(config.addr()).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer =
        order_service::order_consumer(store.clone(), channel.clone(), config.retry_policy());
    let consumer_channel = channel.clone();
    let consumer_task = tokio::spawn(async move {
        consumer
            .run_supervised(consumer_channel.as_ref(), shutdown_rx, Backoff::default())
            .await;
    });

    let app = order_service::create_app(Arc::new(AppState::new(store)), metrics_handle);

    tracing::info!(addr = %config.addr(), "starting order service");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop taking deliveries; the one in flight gets until the timeout.
    let _ = shutdown_tx.send(true);
    match tokio::time::timeout(config.shutdown_timeout, consumer_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "order consumer task failed"),
        Err(_) => tracing::warn!(
            timeout_secs = config.shutdown_timeout.as_secs(),
            "order consumer did not stop in time"
        ),
    }

    if let Err(e) = channel.close().await {
        tracing::warn!(error = %e, "failed to close broker connection");
    }

    tracing::info!("order service shut down gracefully");
    Ok(())
}
