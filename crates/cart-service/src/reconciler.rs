//! Applies order outcomes from the `order-processed` queue to carts.

use async_trait::async_trait;
use common::{ORDER_PROCESSED_QUEUE, OrderStatusEvent};
use messaging::{Disposition, Message, MessageHandler};

use crate::model::Settlement;
use crate::store::CartStore;

/// Consumes [`OrderStatusEvent`]s and settles the matching cart.
///
/// Unknown carts and undecodable payloads are acknowledged and dropped.
/// Store failures ask for a retry.
pub struct CartStatusReconciler<S> {
    store: S,
}

impl<S: CartStore> CartStatusReconciler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Settles the cart named by `event`.
    #[tracing::instrument(skip_all, fields(cart_id = %event.cart_id, status = %event.status))]
    pub async fn reconcile(&self, event: &OrderStatusEvent) -> Disposition {
        let mut cart = match self.store.get(event.cart_id).await {
            Ok(Some(cart)) => cart,
            Ok(None) => {
                tracing::info!("status event for unknown cart ignored");
                metrics::counter!("cart_status_events_ignored_total", "reason" => "unknown_cart")
                    .increment(1);
                return Disposition::Ack;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load cart");
                return Disposition::retry(format!("failed to load cart: {e}"));
            }
        };

        match cart.settle(event) {
            Settlement::Applied => {}
            Settlement::Duplicate => {
                tracing::debug!("cart already settled with this outcome");
                return Disposition::Ack;
            }
            Settlement::Conflict { recorded } => {
                tracing::warn!(
                    %recorded,
                    recorded_order_id = ?cart.order_id,
                    event_order_id = ?event.order_id,
                    "cart already settled with a different outcome, event ignored"
                );
                metrics::counter!("cart_status_events_ignored_total", "reason" => "conflict")
                    .increment(1);
                return Disposition::Ack;
            }
        }

        if let Err(e) = self.store.save(&cart).await {
            tracing::error!(error = %e, "failed to save settled cart");
            return Disposition::retry(format!("failed to save cart: {e}"));
        }

        tracing::info!(order_id = ?cart.order_id, "cart settled");
        metrics::counter!("carts_settled_total", "status" => cart.status.as_str()).increment(1);
        Disposition::Ack
    }
}

#[async_trait]
impl<S: CartStore> MessageHandler for CartStatusReconciler<S> {
    fn name(&self) -> &'static str {
        "cart-status-reconciler"
    }

    async fn handle(&self, message: &Message) -> Disposition {
        match serde_json::from_slice::<OrderStatusEvent>(&message.payload) {
            Ok(event) => self.reconcile(&event).await,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    payload = %message.payload_lossy(),
                    "dropping malformed status event"
                );
                metrics::counter!("messages_dropped_total", "queue" => ORDER_PROCESSED_QUEUE)
                    .increment(1);
                Disposition::Ack
            }
        }
    }
}
