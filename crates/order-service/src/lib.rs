//! Order service: consumes cart submissions, records one order per cart and
//! reports each outcome back on the `order-processed` queue. Orders can be
//! read over HTTP.

pub mod config;
pub mod error;
pub mod model;
pub mod routes;
pub mod store;
pub mod workflow;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use common::ORDERS_QUEUE;
use messaging::{Consumer, MessageChannel, RetryPolicy};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::{ApiError, StoreError};
pub use model::{NewOrder, Order};
pub use routes::orders::AppState;
pub use store::{AddOutcome, InMemoryOrderStore, OrderStore, PostgresOrderStore};
pub use workflow::OrderWorkflow;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: OrderStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    Router::new()
        .route("/api/orders", get(routes::orders::list::<S>))
        .route("/api/orders/{id}", get(routes::orders::get::<S>))
        .with_state(state)
        .merge(common::http::ops_router("order-service", metrics_handle))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the consumer that feeds the `orders` queue into an [`OrderWorkflow`].
pub fn order_consumer<S, C>(
    store: S,
    channel: Arc<C>,
    policy: RetryPolicy,
) -> Consumer<OrderWorkflow<S, C>>
where
    S: OrderStore,
    C: MessageChannel + ?Sized,
{
    Consumer::new(
        ORDERS_QUEUE,
        Arc::new(OrderWorkflow::new(store, channel)),
        policy,
    )
}
