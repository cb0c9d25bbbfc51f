//! Cart aggregate and its settlement rules.

use common::messages::zero_as_none;
use common::{
    CartId, CartStatus, CartSubmission, CustomerId, LineItem, OrderId, OrderStatusEvent,
};
use serde::{Deserialize, Serialize};

/// A shopping cart as stored and served by the cart service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Cart {
    pub cart_id: CartId,
    #[serde(default)]
    pub details: Vec<LineItem>,
    pub total: f64,
    #[serde(default)]
    pub customer_id: CustomerId,
    #[serde(default)]
    pub status: CartStatus,
    #[serde(default, deserialize_with = "zero_as_none")]
    pub order_id: Option<OrderId>,
}

/// Cart contents before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewCart {
    pub details: Vec<LineItem>,
    pub total: f64,
    pub customer_id: CustomerId,
}

impl NewCart {
    pub fn new(customer_id: impl Into<CustomerId>, details: Vec<LineItem>, total: f64) -> Self {
        Self {
            details,
            total,
            customer_id: customer_id.into(),
        }
    }
}

/// Result of applying an [`OrderStatusEvent`] to a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The cart was INITIATED and now carries the reported outcome.
    Applied,
    /// The cart already records this exact outcome.
    Duplicate,
    /// The cart already records a different outcome; the event was not applied.
    Conflict { recorded: CartStatus },
}

impl Cart {
    /// Builds a freshly created cart. New carts always start INITIATED.
    pub fn initiated(cart_id: CartId, new_cart: NewCart) -> Self {
        Self {
            cart_id,
            details: new_cart.details,
            total: new_cart.total,
            customer_id: new_cart.customer_id,
            status: CartStatus::Initiated,
            order_id: None,
        }
    }

    /// Snapshot sent to the order service.
    pub fn submission(&self) -> CartSubmission {
        CartSubmission {
            cart_id: self.cart_id,
            details: self.details.clone(),
            total: self.total,
            customer_id: self.customer_id.clone(),
        }
    }

    /// Records the outcome reported by the order service.
    ///
    /// Only an INITIATED cart changes. The caller must check that the event
    /// belongs to this cart.
    pub fn settle(&mut self, event: &OrderStatusEvent) -> Settlement {
        let outcome = CartStatus::from(event.status);

        if !self.status.is_settled() {
            self.status = outcome;
            self.order_id = event.order_id;
            return Settlement::Applied;
        }

        if self.status == outcome && self.order_id == event.order_id {
            Settlement::Duplicate
        } else {
            Settlement::Conflict {
                recorded: self.status,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cart() -> Cart {
        Cart::initiated(
            CartId::new(1),
            NewCart::new("c1", vec![LineItem::new(7, 10.0, 2)], 20.0),
        )
    }

    #[test]
    fn settle_applies_outcome_once() {
        let mut cart = cart();
        let event = OrderStatusEvent::succeeded(CartId::new(1), OrderId::new(42));

        assert_eq!(cart.settle(&event), Settlement::Applied);
        assert_eq!(cart.status, CartStatus::Success);
        assert_eq!(cart.order_id, Some(OrderId::new(42)));

        assert_eq!(cart.settle(&event), Settlement::Duplicate);
        assert_eq!(cart.order_id, Some(OrderId::new(42)));
    }

    #[test]
    fn conflicting_outcome_is_not_applied() {
        let mut cart = cart();
        cart.settle(&OrderStatusEvent::succeeded(CartId::new(1), OrderId::new(42)));

        let result = cart.settle(&OrderStatusEvent::failed(CartId::new(1)));

        assert_eq!(
            result,
            Settlement::Conflict {
                recorded: CartStatus::Success
            }
        );
        assert_eq!(cart.status, CartStatus::Success);
        assert_eq!(cart.order_id, Some(OrderId::new(42)));
    }

    #[test]
    fn failed_outcome_leaves_order_id_empty() {
        let mut cart = cart();
        assert_eq!(
            cart.settle(&OrderStatusEvent::failed(CartId::new(1))),
            Settlement::Applied
        );
        assert_eq!(cart.status, CartStatus::Failed);
        assert_eq!(cart.order_id, None);
    }

    #[test]
    fn serializes_with_pascal_case_keys() {
        let value = serde_json::to_value(cart()).unwrap();
        assert_eq!(
            value,
            json!({
                "CartId": 1,
                "Details": [{"ProductId": 7, "Price": 10.0, "Quantity": 2}],
                "Total": 20.0,
                "CustomerId": "c1",
                "Status": "INITIATED",
                "OrderId": null
            })
        );
    }

    #[test]
    fn submission_copies_cart_contents() {
        let submission = cart().submission();
        assert_eq!(submission.cart_id, CartId::new(1));
        assert_eq!(submission.total, 20.0);
        assert_eq!(submission.customer_id.as_str(), "c1");
        assert_eq!(submission.details.len(), 1);
    }
}
