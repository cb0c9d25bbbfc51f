use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, Notify};

use crate::{
    ChannelError, Result,
    channel::{Acknowledger, Delivery, DeliveryStream, Message, MessageChannel},
};

/// In-memory broker for tests and local development.
///
/// Mirrors the queue semantics the services rely on: per-queue FIFO, manual
/// acknowledgement, requeue on nack, and redelivery of unacknowledged
/// messages when a consumer goes away. Every published message is also kept
/// in a per-queue log for assertions.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

#[derive(Default)]
struct BrokerState {
    queues: HashMap<String, QueueState>,
    declared: HashSet<String>,
    failing: HashSet<String>,
    closed: bool,
    generation: u64,
    next_tag: u64,
}

impl BrokerState {
    fn queue_mut(&mut self, name: &str) -> &mut QueueState {
        self.queues.entry(name.to_string()).or_default()
    }

    fn requeue_unacked(&mut self, name: &str) -> usize {
        let queue = self.queue_mut(name);
        let mut tags: Vec<u64> = queue.unacked.keys().copied().collect();
        tags.sort_unstable();
        let count = tags.len();
        for tag in tags.into_iter().rev() {
            if let Some(message) = queue.unacked.remove(&tag) {
                queue.ready.push_front(Pending {
                    message,
                    redelivered: true,
                });
            }
        }
        queue.notify.notify_waiters();
        count
    }
}

#[derive(Default)]
struct QueueState {
    ready: VecDeque<Pending>,
    unacked: HashMap<u64, Message>,
    published: Vec<Message>,
    notify: Arc<Notify>,
}

struct Pending {
    message: Message,
    redelivered: bool,
}

impl InMemoryBroker {
    /// Creates a new empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every publish to `queue` fail while `fail` is set.
    pub async fn fail_publishes_to(&self, queue: &str, fail: bool) {
        let mut state = self.state.lock().await;
        if fail {
            state.failing.insert(queue.to_string());
        } else {
            state.failing.remove(queue);
        }
    }

    /// Returns every message ever published to `queue`, in publish order.
    pub async fn published(&self, queue: &str) -> Vec<Message> {
        let state = self.state.lock().await;
        state
            .queues
            .get(queue)
            .map(|q| q.published.clone())
            .unwrap_or_default()
    }

    /// Decodes the JSON payloads published to `queue`, skipping any that do not decode.
    pub async fn published_json<T: DeserializeOwned>(&self, queue: &str) -> Vec<T> {
        self.published(queue)
            .await
            .iter()
            .filter_map(|m| serde_json::from_slice(&m.payload).ok())
            .collect()
    }

    /// Number of messages waiting to be delivered.
    pub async fn ready_count(&self, queue: &str) -> usize {
        let state = self.state.lock().await;
        state.queues.get(queue).map_or(0, |q| q.ready.len())
    }

    /// Number of messages delivered but not yet settled.
    pub async fn unacked_count(&self, queue: &str) -> usize {
        let state = self.state.lock().await;
        state.queues.get(queue).map_or(0, |q| q.unacked.len())
    }

    pub async fn is_declared(&self, queue: &str) -> bool {
        self.state.lock().await.declared.contains(queue)
    }

    /// Puts every unacknowledged message of `queue` back at the head, flagged as redelivered.
    ///
    /// Returns how many messages were requeued.
    pub async fn requeue_unacked(&self, queue: &str) -> usize {
        self.state.lock().await.requeue_unacked(queue)
    }

    /// Ends every open delivery stream and requeues what they left unacknowledged,
    /// the way a dropped broker connection would. New subscriptions still work.
    pub async fn interrupt_consumers(&self) {
        let mut state = self.state.lock().await;
        state.generation += 1;
        let names: Vec<String> = state.queues.keys().cloned().collect();
        for name in names {
            state.requeue_unacked(&name);
        }
        tracing::debug!(generation = state.generation, "in-memory consumers interrupted");
    }

    async fn settle(&self, queue: &str, tag: u64, requeue: Option<bool>) -> Result<()> {
        let mut state = self.state.lock().await;
        let queue_state = state.queue_mut(queue);
        let message = queue_state
            .unacked
            .remove(&tag)
            .ok_or_else(|| ChannelError::Ack(format!("unknown delivery tag {tag} on '{queue}'")))?;

        if requeue == Some(true) {
            queue_state.ready.push_front(Pending {
                message,
                redelivered: true,
            });
            queue_state.notify.notify_one();
        }
        Ok(())
    }

    async fn next_delivery(&self, queue: &str, generation: u64) -> Option<Delivery> {
        loop {
            let mut state = self.state.lock().await;
            if state.closed || state.generation != generation {
                return None;
            }

            state.next_tag += 1;
            let tag = state.next_tag;
            let queue_state = state.queue_mut(queue);

            if let Some(pending) = queue_state.ready.pop_front() {
                queue_state.unacked.insert(tag, pending.message.clone());
                let acker = MemoryAcker {
                    broker: self.clone(),
                    queue: queue.to_string(),
                    tag,
                };
                return Some(Delivery::new(pending.message, pending.redelivered, acker));
            }

            // Register interest before releasing the lock so no wakeup is missed.
            let notify = queue_state.notify.clone();
            let notified = notify.notified();
            drop(state);
            notified.await;
        }
    }
}

#[async_trait]
impl MessageChannel for InMemoryBroker {
    async fn declare_queue(&self, name: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(ChannelError::Closed("broker is closed".to_string()));
        }
        state.declared.insert(name.to_string());
        state.queue_mut(name);
        Ok(())
    }

    async fn publish(&self, queue: &str, message: Message) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(ChannelError::Closed("broker is closed".to_string()));
        }
        if state.failing.contains(queue) {
            return Err(ChannelError::Publish {
                queue: queue.to_string(),
                reason: "injected publish failure".to_string(),
            });
        }

        let queue_state = state.queue_mut(queue);
        queue_state.published.push(message.clone());
        queue_state.ready.push_back(Pending {
            message,
            redelivered: false,
        });
        queue_state.notify.notify_one();
        Ok(())
    }

    async fn subscribe(&self, queue: &str) -> Result<DeliveryStream> {
        let generation = {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(ChannelError::Subscribe {
                    queue: queue.to_string(),
                    reason: "broker is closed".to_string(),
                });
            }
            state.queue_mut(queue);
            state.generation
        };

        let broker = self.clone();
        let queue = queue.to_string();
        let stream = futures_util::stream::unfold((broker, queue), move |(broker, queue)| async move {
            let delivery = broker.next_delivery(&queue, generation).await?;
            Some((Ok(delivery), (broker, queue)))
        });

        Ok(Box::pin(stream))
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.closed = true;
        for queue in state.queues.values() {
            queue.notify.notify_waiters();
        }
        Ok(())
    }
}

struct MemoryAcker {
    broker: InMemoryBroker,
    queue: String,
    tag: u64,
}

#[async_trait]
impl Acknowledger for MemoryAcker {
    async fn ack(&self) -> Result<()> {
        self.broker.settle(&self.queue, self.tag, None).await
    }

    async fn nack(&self, requeue: bool) -> Result<()> {
        self.broker.settle(&self.queue, self.tag, Some(requeue)).await
    }
}
