//! Durable-queue messaging for the cart and order services.
//!
//! [`MessageChannel`] is the broker contract: declare a queue, publish bytes,
//! subscribe with manual acknowledgement. [`AmqpChannel`] talks to RabbitMQ,
//! [`InMemoryBroker`] backs tests and local runs, and [`Consumer`] runs the
//! per-queue loop with bounded retry and dead-lettering.

pub mod amqp;
pub mod channel;
pub mod config;
pub mod consumer;
pub mod error;
pub mod memory;

pub use amqp::AmqpChannel;
pub use channel::{
    ATTEMPT_HEADER, Acknowledger, Delivery, DeliveryStream, Message, MessageChannel,
    MessageChannelExt, dead_letter_queue,
};
pub use config::BrokerConfig;
pub use consumer::{Backoff, Consumer, Disposition, MessageHandler, RetryPolicy};
pub use error::{ChannelError, Result};
pub use memory::InMemoryBroker;
