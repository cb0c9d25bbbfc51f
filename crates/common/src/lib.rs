//! Shared vocabulary for the cart and order services.

pub mod config;
pub mod http;
pub mod messages;
pub mod runtime;
pub mod types;

pub use config::ConfigError;
pub use messages::{CartSubmission, ORDER_PROCESSED_QUEUE, ORDERS_QUEUE, OrderStatusEvent};
pub use types::{CartId, CartStatus, CustomerId, LineItem, OrderId, OrderStatus, UnknownStatus};
