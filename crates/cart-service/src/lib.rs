//! Cart service: HTTP CRUD over carts, submission of new carts to the order
//! service, and reconciliation of the outcomes it reports back.
//!
//! The service never calls the order service directly. New carts go out on
//! the `orders` queue; outcomes come back on `order-processed`.

pub mod config;
pub mod error;
pub mod model;
pub mod publisher;
pub mod reconciler;
pub mod routes;
pub mod store;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use common::ORDER_PROCESSED_QUEUE;
use messaging::{Consumer, MessageChannel, RetryPolicy};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::{ApiError, StoreError, SubmitError};
pub use model::{Cart, NewCart, Settlement};
pub use publisher::submit_cart;
pub use reconciler::CartStatusReconciler;
pub use routes::carts::AppState;
pub use store::{CartStore, InMemoryCartStore, PostgresCartStore};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, C>(state: Arc<AppState<S, C>>, metrics_handle: PrometheusHandle) -> Router
where
    S: CartStore + 'static,
    C: MessageChannel + ?Sized + 'static,
{
    Router::new()
        .route(
            "/api/carts",
            get(routes::carts::list::<S, C>).post(routes::carts::create::<S, C>),
        )
        .route(
            "/api/carts/{id}",
            get(routes::carts::get::<S, C>)
                .put(routes::carts::update::<S, C>)
                .delete(routes::carts::delete::<S, C>),
        )
        .with_state(state)
        .merge(common::http::ops_router("cart-service", metrics_handle))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Builds the consumer that feeds `order-processed` into a [`CartStatusReconciler`].
pub fn status_consumer<S: CartStore>(
    store: S,
    policy: RetryPolicy,
) -> Consumer<CartStatusReconciler<S>> {
    Consumer::new(
        ORDER_PROCESSED_QUEUE,
        Arc::new(CartStatusReconciler::new(store)),
        policy,
    )
}
