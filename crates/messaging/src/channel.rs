use std::borrow::Cow;
use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use serde::Serialize;

use crate::Result;

/// Header carrying the number of failed processing attempts before this delivery.
pub const ATTEMPT_HEADER: &str = "x-delivery-attempt";

/// Returns the dead-letter queue paired with `queue`.
pub fn dead_letter_queue(queue: &str) -> String {
    format!("{queue}.dead-letter")
}

/// A message body together with its retry bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub payload: Vec<u8>,
    /// Failed processing attempts so far. Zero for a fresh message.
    pub attempt: u32,
}

impl Message {
    /// Creates a fresh message.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            attempt: 0,
        }
    }

    /// Returns a copy of this message carrying a different attempt count.
    #[must_use]
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    /// Payload as text, for logging.
    pub fn payload_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Settles a single delivery with the broker.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Confirms the delivery; the broker forgets the message.
    async fn ack(&self) -> Result<()>;

    /// Rejects the delivery. With `requeue` the broker redelivers it.
    async fn nack(&self, requeue: bool) -> Result<()>;
}

/// A message received from a queue that has not been settled yet.
///
/// Dropping a delivery without settling it leaves the message unacknowledged;
/// the broker redelivers it once the consuming channel goes away.
pub struct Delivery {
    message: Message,
    redelivered: bool,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(message: Message, redelivered: bool, acker: impl Acknowledger + 'static) -> Self {
        Self {
            message,
            redelivered,
            acker: Box::new(acker),
        }
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn payload(&self) -> &[u8] {
        &self.message.payload
    }

    pub fn attempt(&self) -> u32 {
        self.message.attempt
    }

    /// True when the broker has handed this message out before.
    pub fn redelivered(&self) -> bool {
        self.redelivered
    }

    pub async fn ack(self) -> Result<()> {
        self.acker.ack().await
    }

    pub async fn nack(self, requeue: bool) -> Result<()> {
        self.acker.nack(requeue).await
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("message", &self.message)
            .field("redelivered", &self.redelivered)
            .finish_non_exhaustive()
    }
}

/// A stream of deliveries from a single queue.
pub type DeliveryStream = Pin<Box<dyn Stream<Item = Result<Delivery>> + Send>>;

/// Core trait for broker connections.
///
/// Delivery is at-least-once: a subscriber sees every message until it acks
/// it, possibly more than once. All implementations must be thread-safe.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Declares a queue. Declaring an existing queue is a no-op.
    async fn declare_queue(&self, name: &str) -> Result<()>;

    /// Publishes a message to a queue through the default exchange.
    async fn publish(&self, queue: &str, message: Message) -> Result<()>;

    /// Starts consuming a queue with manual acknowledgement.
    async fn subscribe(&self, queue: &str) -> Result<DeliveryStream>;

    /// Closes consumers and the underlying connection.
    async fn close(&self) -> Result<()>;
}

/// Extension trait providing convenience methods for channels.
#[async_trait]
pub trait MessageChannelExt: MessageChannel {
    /// Serializes `value` as JSON and publishes it as a fresh message.
    async fn publish_json<T>(&self, queue: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let payload = serde_json::to_vec(value)?;
        self.publish(queue, Message::new(payload)).await
    }
}

// Blanket implementation for all MessageChannel implementations
impl<T: MessageChannel + ?Sized> MessageChannelExt for T {}
