//! Hands newly created carts to the order service.

use common::ORDERS_QUEUE;
use messaging::{MessageChannel, MessageChannelExt};

use crate::error::SubmitError;
use crate::model::{Cart, NewCart};
use crate::store::CartStore;

/// Persists `new_cart` as INITIATED and publishes its submission on the `orders` queue.
///
/// Returns as soon as the submission is on the broker; fulfillment is
/// reported back asynchronously.
///
/// # Errors
///
/// [`SubmitError::Store`] if the cart could not be saved, in which case
/// nothing was published. [`SubmitError::Publish`] if the cart was saved but
/// the broker rejected the submission; the cart stays INITIATED.
#[tracing::instrument(skip_all, fields(customer_id = %new_cart.customer_id))]
pub async fn submit_cart<S, C>(store: &S, channel: &C, new_cart: NewCart) -> Result<Cart, SubmitError>
where
    S: CartStore + ?Sized,
    C: MessageChannel + ?Sized,
{
    let cart = store.add(new_cart).await?;

    if let Err(source) = channel.publish_json(ORDERS_QUEUE, &cart.submission()).await {
        tracing::error!(
            cart_id = %cart.cart_id,
            error = %source,
            "cart saved but submission was not published"
        );
        metrics::counter!("cart_submissions_failed_total").increment(1);
        return Err(SubmitError::Publish {
            cart_id: cart.cart_id,
            source,
        });
    }

    tracing::info!(
        cart_id = %cart.cart_id,
        items = cart.details.len(),
        total = cart.total,
        "cart submitted for fulfillment"
    );
    metrics::counter!("cart_submissions_total").increment(1);
    Ok(cart)
}
