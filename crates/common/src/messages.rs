//! Message contracts exchanged between the cart and order services.
//!
//! Both payloads travel as UTF-8 JSON with PascalCase keys. They are never
//! persisted on their own.

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::{CartId, CustomerId, LineItem, OrderId, OrderStatus};

/// Queue carrying [`CartSubmission`] from the cart service to the order service.
pub const ORDERS_QUEUE: &str = "orders";

/// Queue carrying [`OrderStatusEvent`] from the order service back to the cart service.
pub const ORDER_PROCESSED_QUEUE: &str = "order-processed";

/// Snapshot of a cart at submission time.
///
/// Extra fields (a full cart with `Status` and `OrderId`) are ignored on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CartSubmission {
    pub cart_id: CartId,
    #[serde(default)]
    pub details: Vec<LineItem>,
    pub total: f64,
    #[serde(default)]
    pub customer_id: CustomerId,
}

/// Outcome of processing a [`CartSubmission`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrderStatusEvent {
    pub cart_id: CartId,
    /// Absent when the order was never persisted. A `0` on the wire means the same.
    #[serde(default, deserialize_with = "zero_as_none")]
    pub order_id: Option<OrderId>,
    pub status: OrderStatus,
}

impl OrderStatusEvent {
    pub fn succeeded(cart_id: CartId, order_id: OrderId) -> Self {
        Self {
            cart_id,
            order_id: Some(order_id),
            status: OrderStatus::Success,
        }
    }

    pub fn failed(cart_id: CartId) -> Self {
        Self {
            cart_id,
            order_id: None,
            status: OrderStatus::Failed,
        }
    }
}

/// Decodes an optional order id, treating `0` as absent.
pub fn zero_as_none<'de, D>(deserializer: D) -> Result<Option<OrderId>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw.filter(|id| *id != 0).map(OrderId::new))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn submission_decodes_full_cart_payload() {
        let payload = json!({
            "CartId": 1,
            "Details": [{"ProductId": 7, "Price": 10.0, "Quantity": 2}],
            "Total": 20.0,
            "CustomerId": "c1",
            "Status": "INITIATED",
            "OrderId": 0
        });

        let submission: CartSubmission = serde_json::from_value(payload).unwrap();
        assert_eq!(submission.cart_id, CartId::new(1));
        assert_eq!(submission.details, vec![LineItem::new(7, 10.0, 2)]);
        assert_eq!(submission.customer_id.as_str(), "c1");
    }

    #[test]
    fn status_event_wire_shape() {
        let event = OrderStatusEvent::succeeded(CartId::new(1), OrderId::new(42));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json, json!({"CartId": 1, "OrderId": 42, "Status": "SUCCESS"}));
    }

    #[test]
    fn zero_order_id_decodes_as_absent() {
        let event: OrderStatusEvent =
            serde_json::from_str(r#"{"CartId": 3, "OrderId": 0, "Status": "FAILED"}"#).unwrap();
        assert_eq!(event, OrderStatusEvent::failed(CartId::new(3)));

        let event: OrderStatusEvent =
            serde_json::from_str(r#"{"CartId": 3, "Status": "FAILED"}"#).unwrap();
        assert_eq!(event.order_id, None);
    }

    #[test]
    fn status_event_rejects_initiated() {
        let result = serde_json::from_str::<OrderStatusEvent>(
            r#"{"CartId": 1, "OrderId": 2, "Status": "INITIATED"}"#,
        );
        assert!(result.is_err());
    }
}
