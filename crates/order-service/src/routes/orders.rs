//! Read-only order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::OrderId;

use crate::error::ApiError;
use crate::model::Order;
use crate::store::OrderStore;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub store: S,
}

impl<S: OrderStore> AppState<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

/// GET /api/orders
#[tracing::instrument(skip(state))]
pub async fn list<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.store.list().await?))
}

/// GET /api/orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: OrderStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<i64>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .store
        .get(OrderId::new(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(order))
}
