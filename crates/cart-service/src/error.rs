//! Error types for the cart service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use common::CartId;
use messaging::ChannelError;
use thiserror::Error;

/// Errors that can occur when interacting with the cart store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The cart does not exist.
    #[error("Cart {0} not found")]
    NotFound(CartId),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored column could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store refused the operation.
    #[error("Cart store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for cart store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors from submitting a cart for fulfillment.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The cart was stored but its submission never reached the broker.
    #[error("Cart {cart_id} was saved but could not be submitted: {source}")]
    Publish {
        cart_id: CartId,
        #[source]
        source: ChannelError,
    },
}

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ApiError::NotFound(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Store(e) => e.into(),
            e @ SubmitError::Publish { .. } => ApiError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_cart_maps_to_not_found() {
        let err: ApiError = StoreError::NotFound(CartId::new(9)).into();
        assert!(matches!(err, ApiError::NotFound(ref msg) if msg == "Cart 9 not found"));
    }

    #[test]
    fn publish_failure_names_the_cart() {
        let err: ApiError = SubmitError::Publish {
            cart_id: CartId::new(3),
            source: ChannelError::Closed("gone".to_string()),
        }
        .into();

        match err {
            ApiError::Internal(msg) => assert!(msg.contains("Cart 3")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
