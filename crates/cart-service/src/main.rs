//! Cart service entry point.

use std::sync::Arc;

use cart_service::config::Config;
use cart_service::{AppState, CartStore, InMemoryCartStore, PostgresCartStore, StoreError};
use common::runtime::{init_tracing, shutdown_signal};
use common::{ConfigError, ORDERS_QUEUE};
use messaging::{AmqpChannel, Backoff, ChannelError, MessageChannel};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Anything that stops the service from coming up.
#[derive(Debug, Error)]
enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("cart store error: {0}")]
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
        tracing::error!(error = %e, "cart service stopped with an error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = Config::from_env()?;
    let metrics_handle = PrometheusBuilder::new().install_recorder()?;

    let channel = Arc::new(AmqpChannel::connect(config.broker.clone()).await?);
    channel.declare_queue(ORDERS_QUEUE).await?;

    if config.uses_memory_store() {
        tracing::warn!("using the in-memory cart store, carts are lost on exit");
        serve(config, InMemoryCartStore::new(), channel, metrics_handle).await
    } else {
        let store = PostgresCartStore::connect(&config.database_url).await?;
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
    S: CartStore + Clone + 'static,
{
    let listener = TcpListener::bind(config.addr()).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = cart_service::status_consumer(store.clone(), config.retry_policy());
    let consumer_channel = channel.clone();
    let consumer_task = tokio::spawn(async move {
        consumer
            .run_supervised(consumer_channel.as_ref(), shutdown_rx, Backoff::default())
            .await;
    });

    let state = Arc::new(AppState::new(store, channel.clone()));
    let app = cart_service::create_app(state, metrics_handle);

    tracing::info!(addr = %config.addr(), "starting cart service");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop taking deliveries; the one in flight gets until the timeout.
    let _ = shutdown_tx.send(true);
    match tokio::time::timeout(config.shutdown_timeout, consumer_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "status consumer task failed"),
        Err(_) => tracing::warn!(
            timeout_secs = config.shutdown_timeout.as_secs(),
            "status consumer did not stop in time"
        ),
    }

    if let Err(e) = channel.close().await {
        tracing::warn!(error = %e, "failed to close broker connection");
    }

    tracing::info!("cart service shut down gracefully");
    Ok(())
}
