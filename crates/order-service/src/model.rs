use common::{CartId, CartSubmission, CustomerId, LineItem, OrderId, OrderStatus};
use serde::{Deserialize, Serialize};

/// A persisted order. There is at most one per cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Order {
    pub order_id: OrderId,
    pub cart_id: CartId,
    pub details: Vec<LineItem>,
    pub total: f64,
    pub customer_id: CustomerId,
    pub status: OrderStatus,
}

/// Order contents before the store assigns an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub cart_id: CartId,
    pub details: Vec<LineItem>,
    pub total: f64,
    pub customer_id: CustomerId,
    pub status: OrderStatus,
}

impl NewOrder {
    /// A successful order built from a cart submission.
    pub fn from_submission(submission: CartSubmission) -> Self {
        Self {
            cart_id: submission.cart_id,
            details: submission.details,
            total: submission.total,
            customer_id: submission.customer_id,
            status: OrderStatus::Success,
        }
    }

    pub fn with_id(self, order_id: OrderId) -> Order {
        Order {
            order_id,
            cart_id: self.cart_id,
            details: self.details,
            total: self.total,
            customer_id: self.customer_id,
            status: self.status,
        }
    }
}
