//! RabbitMQ-backed channel built on `lapin`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::acker::Acker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    BasicQosOptions, ConfirmSelectOptions, QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::{AMQPValue, FieldTable, ShortString};
use lapin::uri::{AMQPAuthority, AMQPUri, AMQPUserInfo};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tokio::sync::{Mutex, RwLock};

use crate::{
    BrokerConfig, ChannelError, Result,
    channel::{ATTEMPT_HEADER, Acknowledger, Delivery, DeliveryStream, Message, MessageChannel},
};

/// Consumers see one unacknowledged message at a time.
const PREFETCH: u16 = 1;

/// AMQP channel over a long-lived broker connection.
///
/// Publishing and queue declaration borrow a short-lived channel from the
/// connection for each call. Each queue has at most one subscription channel:
/// subscribing again closes the previous one, which hands its unacknowledged
/// message back to the broker. When the connection drops, the next call
/// reconnects; open delivery streams end with an error so the consumer can
/// resubscribe.
pub struct AmqpChannel {
    config: BrokerConfig,
    connection: RwLock<Arc<Connection>>,
    consumers: Mutex<HashMap<String, Channel>>,
}

impl AmqpChannel {
    /// Connects to the broker.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Connection`] if the broker is unreachable or
    /// rejects the credentials.
    pub async fn connect(config: BrokerConfig) -> Result<Self> {
        let connection = open_connection(&config).await?;
        Ok(Self {
            config,
            connection: RwLock::new(Arc::new(connection)),
            consumers: Mutex::default(),
        })
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.read().await.status().connected()
    }

    /// Number of queues with an open subscription channel.
    pub async fn subscription_count(&self) -> usize {
        self.consumers.lock().await.len()
    }

    async fn live_connection(&self) -> Result<Arc<Connection>> {
        {
            let current = self.connection.read().await;
            if current.status().connected() {
                return Ok(current.clone());
            }
        }

        let mut current = self.connection.write().await;
        if !current.status().connected() {
            tracing::warn!(
                broker = %self.config.redacted_uri(),
                "broker connection lost, reconnecting"
            );
            *current = Arc::new(open_connection(&self.config).await?);
            self.consumers.lock().await.clear();
        }
        Ok(current.clone())
    }

    async fn open_channel(&self) -> Result<Channel> {
        let connection = self.live_connection().await?;
        connection
            .create_channel()
            .await
            .map_err(|e| ChannelError::Connection(format!("failed to open channel: {e}")))
    }
}

async fn open_connection(config: &BrokerConfig) -> Result<Connection> {
    let uri = AMQPUri {
        authority: AMQPAuthority {
            userinfo: AMQPUserInfo {
                username: config.user.clone(),
                password: config.password.clone(),
            },
            host: config.host.clone(),
            port: config.port,
        },
        vhost: config.vhost.clone(),
        ..AMQPUri::default()
    };

    let connection = Connection::connect_uri(uri, ConnectionProperties::default())
        .await
        .map_err(|e| ChannelError::Connection(format!("{}: {e}", config.redacted_uri())))?;

    let broker = config.redacted_uri();
    connection.on_error(move |err| {
        tracing::error!(broker = %broker, error = %err, "broker connection shut down");
        metrics::counter!("broker_connection_errors_total").increment(1);
    });

    tracing::info!(broker = %config.redacted_uri(), "connected to broker");
    Ok(connection)
}

async fn close_quietly(channel: &Channel) {
    if let Err(e) = channel.close(200, "OK").await {
        tracing::debug!(error = %e, "failed to close broker channel");
    }
}

async fn publish_on(channel: &Channel, queue: &str, message: &Message) -> Result<()> {
    let publish_err = |reason: String| ChannelError::Publish {
        queue: queue.to_string(),
        reason,
    };

    channel
        .confirm_select(ConfirmSelectOptions::default())
        .await
        .map_err(|e| publish_err(e.to_string()))?;

    let mut headers = FieldTable::default();
    headers.insert(
        ShortString::from(ATTEMPT_HEADER),
        AMQPValue::LongUInt(message.attempt),
    );
    let properties = BasicProperties::default()
        .with_content_type(ShortString::from("application/json"))
        .with_headers(headers);

    let confirmation = channel
        .basic_publish(
            "",
            queue,
            BasicPublishOptions::default(),
            &message.payload,
            properties,
        )
        .await
        .map_err(|e| publish_err(e.to_string()))?
        .await
        .map_err(|e| publish_err(e.to_string()))?;

    if let Confirmation::Nack(_) = confirmation {
        return Err(publish_err("broker rejected the message".to_string()));
    }
    Ok(())
}

fn attempt_from(properties: &BasicProperties) -> u32 {
    properties
        .headers()
        .as_ref()
        .and_then(|headers| {
            headers
                .inner()
                .iter()
                .find(|(key, _)| key.as_str() == ATTEMPT_HEADER)
                .and_then(|(_, value)| match value {
                    AMQPValue::LongUInt(n) => Some(*n),
                    AMQPValue::LongInt(n) => u32::try_from(*n).ok(),
                    AMQPValue::LongLongInt(n) => u32::try_from(*n).ok(),
                    AMQPValue::ShortUInt(n) => Some(u32::from(*n)),
                    _ => None,
                })
        })
        .unwrap_or(0)
}

fn into_delivery(delivery: lapin::message::Delivery) -> Delivery {
    let message = Message {
        attempt: attempt_from(&delivery.properties),
        payload: delivery.data,
    };
    Delivery::new(message, delivery.redelivered, AmqpAcker(delivery.acker))
}

#[async_trait]
impl MessageChannel for AmqpChannel {
    async fn declare_queue(&self, name: &str) -> Result<()> {
        let channel = self.open_channel().await?;
        let result = channel
            .queue_declare(name, QueueDeclareOptions::default(), FieldTable::default())
            .await
            .map(|_| ())
            .map_err(|e| ChannelError::Declare {
                queue: name.to_string(),
                reason: e.to_string(),
            });
        close_quietly(&channel).await;

        if result.is_ok() {
            tracing::debug!(queue = name, "queue declared");
        }
        result
    }

    async fn publish(&self, queue: &str, message: Message) -> Result<()> {
        let channel = self.open_channel().await?;
        let result = publish_on(&channel, queue, &message).await;
        close_quietly(&channel).await;

        match &result {
            Ok(()) => tracing::debug!(
                queue,
                attempt = message.attempt,
                bytes = message.payload.len(),
                "message published"
            ),
            Err(e) => tracing::error!(queue, error = %e, "failed to publish message"),
        }
        result
    }

    async fn subscribe(&self, queue: &str) -> Result<DeliveryStream> {
        let subscribe_err = |reason: String| ChannelError::Subscribe {
            queue: queue.to_string(),
            reason,
        };

        let previous = self.consumers.lock().await.remove(queue);
        if let Some(previous) = previous {
            tracing::debug!(queue, "closing previous subscription channel");
            close_quietly(&previous).await;
        }

        let channel = self.open_channel().await?;
        channel
            .basic_qos(PREFETCH, BasicQosOptions::default())
            .await
            .map_err(|e| subscribe_err(e.to_string()))?;

        let consumer = channel
            .basic_consume(
                queue,
                &format!("{queue}-consumer"),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| subscribe_err(e.to_string()))?;

        self.consumers
            .lock()
            .await
            .insert(queue.to_string(), channel);
        tracing::info!(queue, prefetch = PREFETCH, manual_ack = true, "subscribed to queue");

        let queue = queue.to_string();
        let stream = consumer.map(move |result| match result {
            Ok(delivery) => Ok(into_delivery(delivery)),
            Err(e) => Err(ChannelError::Closed(format!(
                "delivery stream for '{queue}' failed: {e}"
            ))),
        });

        Ok(Box::pin(stream))
    }

    async fn close(&self) -> Result<()> {
        let consumers = std::mem::take(&mut *self.consumers.lock().await);
        for channel in consumers.values() {
            close_quietly(channel).await;
        }

        let connection = self.connection.read().await.clone();
        if connection.status().connected() {
            connection
                .close(200, "OK")
                .await
                .map_err(|e| ChannelError::Closed(e.to_string()))?;
        }

        tracing::info!(broker = %self.config.redacted_uri(), "broker connection closed");
        Ok(())
    }
}

struct AmqpAcker(Acker);

#[async_trait]
impl Acknowledger for AmqpAcker {
    async fn ack(&self) -> Result<()> {
        self.0
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ())
            .map_err(|e| ChannelError::Ack(e.to_string()))
    }

    async fn nack(&self, requeue: bool) -> Result<()> {
        self.0
            .nack(BasicNackOptions {
                requeue,
                ..BasicNackOptions::default()
            })
            .await
            .map(|_| ())
            .map_err(|e| ChannelError::Ack(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amqp_channel_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<AmqpChannel>();
        assert_sync::<AmqpChannel>();
    }

    #[test]
    fn attempt_defaults_to_zero_without_header() {
        assert_eq!(attempt_from(&BasicProperties::default()), 0);
    }

    #[test]
    fn attempt_read_from_header() {
        let mut headers = FieldTable::default();
        headers.insert(ShortString::from(ATTEMPT_HEADER), AMQPValue::LongUInt(3));
        let properties = BasicProperties::default().with_headers(headers);
        assert_eq!(attempt_from(&properties), 3);
    }

    #[test]
    fn negative_attempt_header_is_ignored() {
        let mut headers = FieldTable::default();
        headers.insert(ShortString::from(ATTEMPT_HEADER), AMQPValue::LongInt(-1));
        let properties = BasicProperties::default().with_headers(headers);
        assert_eq!(attempt_from(&properties), 0);
    }
}
