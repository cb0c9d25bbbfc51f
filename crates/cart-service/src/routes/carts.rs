//! Cart CRUD endpoints under `/api/carts`.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::http::header::LOCATION;
use axum::response::IntoResponse;
use common::messages::zero_as_none;
use common::{CartId, CartStatus, CustomerId, LineItem, OrderId};
use messaging::MessageChannel;
use serde::Deserialize;

use crate::error::ApiError;
use crate::model::{Cart, NewCart};
use crate::publisher::submit_cart;
use crate::store::CartStore;

/// Shared application state accessible from all handlers.
pub struct AppState<S, C: ?Sized> {
    pub store: S,
    pub channel: Arc<C>,
}

impl<S: CartStore, C: MessageChannel + ?Sized> AppState<S, C> {
    pub fn new(store: S, channel: Arc<C>) -> Self {
        Self { store, channel }
    }
}

// -- Request types --

/// Body of `POST /api/carts`. Id, status and order id are assigned by the service.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateCartRequest {
    #[serde(default)]
    pub details: Vec<LineItem>,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub customer_id: CustomerId,
}

impl From<CreateCartRequest> for NewCart {
    fn from(req: CreateCartRequest) -> Self {
        NewCart {
            details: req.details,
            total: req.total,
            customer_id: req.customer_id,
        }
    }
}

/// Body of `PUT /api/carts/{id}`: the full cart.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateCartRequest {
    pub cart_id: Option<CartId>,
    #[serde(default)]
    pub details: Vec<LineItem>,
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub customer_id: CustomerId,
    #[serde(default)]
    pub status: CartStatus,
    #[serde(default, deserialize_with = "zero_as_none")]
    pub order_id: Option<OrderId>,
}

// -- Handlers --

/// GET /api/carts: every cart.
#[tracing::instrument(skip(state))]
pub async fn list<S, C>(State(state): State<Arc<AppState<S, C>>>) -> Result<Json<Vec<Cart>>, ApiError>
where
    S: CartStore + 'static,
    C: MessageChannel + ?Sized + 'static,
{
    Ok(Json(state.store.list().await?))
}

/// GET /api/carts/{id}: one cart.
#[tracing::instrument(skip(state))]
pub async fn get<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<i64>,
) -> Result<Json<Cart>, ApiError>
where
    S: CartStore + 'static,
    C: MessageChannel + ?Sized + 'static,
{
    let cart = state
        .store
        .get(CartId::new(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Cart {id} not found")))?;

    Ok(Json(cart))
}

/// POST /api/carts: store the cart and submit it for fulfillment.
///
/// Responds once the submission is on the broker, without waiting for the order.
#[tracing::instrument(skip(state, req))]
pub async fn create<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Json(req): Json<CreateCartRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    S: CartStore + 'static,
    C: MessageChannel + ?Sized + 'static,
{
    let cart = submit_cart(&state.store, state.channel.as_ref(), req.into()).await?;
    let location = format!("/api/carts/{}", cart.cart_id);

    Ok((StatusCode::CREATED, [(LOCATION, location)], Json(cart)))
}

/// PUT /api/carts/{id}: replace a cart.
///
/// The body's `CartId` must match the path; that is checked before existence.
#[tracing::instrument(skip(state, req))]
pub async fn update<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCartRequest>,
) -> Result<StatusCode, ApiError>
where
    S: CartStore + 'static,
    C: MessageChannel + ?Sized + 'static,
{
    let cart_id = CartId::new(id);
    if req.cart_id != Some(cart_id) {
        return Err(ApiError::BadRequest(format!(
            "Body CartId does not match path id {id}"
        )));
    }

    let cart = Cart {
        cart_id,
        details: req.details,
        total: req.total,
        customer_id: req.customer_id,
        status: req.status,
        order_id: req.order_id,
    };
    state.store.save(&cart).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/carts/{id}
#[tracing::instrument(skip(state))]
pub async fn delete<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
    S: CartStore + 'static,
    C: MessageChannel + ?Sized + 'static,
{
    if state.store.delete(CartId::new(id)).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Cart {id} not found")))
    }
}
