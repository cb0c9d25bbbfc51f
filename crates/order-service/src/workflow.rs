//! Turns cart submissions from the `orders` queue into orders.

use std::sync::Arc;

use async_trait::async_trait;
use common::{CartSubmission, ORDER_PROCESSED_QUEUE, ORDERS_QUEUE, OrderStatusEvent};
use messaging::{Disposition, Message, MessageChannel, MessageChannelExt, MessageHandler};

use crate::model::NewOrder;
use crate::store::{AddOutcome, OrderStore};

/// Consumes [`CartSubmission`]s, records an order for each cart and
/// publishes the outcome on `order-processed`.
///
/// Every decodable submission produces exactly one status event per
/// delivery, even when the order could not be stored. Redelivery of a
/// submission reuses the order already stored for its cart.
pub struct OrderWorkflow<S, C: ?Sized> {
    store: S,
    channel: Arc<C>,
}

impl<S, C> OrderWorkflow<S, C>
where
    S: OrderStore,
    C: MessageChannel + ?Sized,
{
    pub fn new(store: S, channel: Arc<C>) -> Self {
        Self { store, channel }
    }

    /// Records the order for `submission` and reports the outcome.
    #[tracing::instrument(skip_all, fields(cart_id = %submission.cart_id))]
    pub async fn process(&self, submission: CartSubmission) -> Disposition {
        let cart_id = submission.cart_id;
        tracing::info!(
            total = submission.total,
            customer_id = %submission.customer_id,
            items = submission.details.len(),
            "cart submission received"
        );

        let event = match self.store.add(NewOrder::from_submission(submission)).await {
            Ok(AddOutcome::Created(order)) => {
                tracing::info!(order_id = %order.order_id, "order created");
                metrics::counter!("orders_created_total").increment(1);
                OrderStatusEvent {
                    cart_id,
                    order_id: Some(order.order_id),
                    status: order.status,
                }
            }
            Ok(AddOutcome::Existing(order)) => {
                tracing::info!(
                    order_id = %order.order_id,
                    "cart already has an order, reporting it again"
                );
                metrics::counter!("orders_duplicate_submissions_total").increment(1);
                OrderStatusEvent {
                    cart_id,
                    order_id: Some(order.order_id),
                    status: order.status,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to store order, reporting failure");
                metrics::counter!("orders_failed_total").increment(1);
                OrderStatusEvent::failed(cart_id)
            }
        };

        if let Err(e) = self.channel.publish_json(ORDER_PROCESSED_QUEUE, &event).await {
            tracing::error!(error = %e, status = %event.status, "failed to publish order status");
            return Disposition::retry(format!("failed to publish order status: {e}"));
        }

        tracing::info!(
            order_id = ?event.order_id,
            status = %event.status,
            "order status published"
        );
        Disposition::Ack
    }
}

#[async_trait]
impl<S, C> MessageHandler for OrderWorkflow<S, C>
where
    S: OrderStore,
    C: MessageChannel + ?Sized,
{
    fn name(&self) -> &'static str {
        "order-workflow"
    }

    async fn handle(&self, message: &Message) -> Disposition {
        match serde_json::from_slice::<CartSubmission>(&message.payload) {
            Ok(submission) => self.process(submission).await,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    payload = %message.payload_lossy(),
                    "dropping malformed cart submission"
                );
                metrics::counter!("messages_dropped_total", "queue" => ORDERS_QUEUE).increment(1);
                Disposition::Ack
            }
        }
    }
}
