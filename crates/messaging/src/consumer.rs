//! Long-running consumer loop with bounded retry and dead-lettering.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::watch;

use crate::{
    ChannelError, Result,
    channel::{Delivery, MessageChannel, dead_letter_queue},
};

/// What a handler wants done with a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Processing is finished, including "malformed, dropped". The message is acknowledged.
    Ack,
    /// Processing failed in a way worth retrying.
    Retry { reason: String },
}

impl Disposition {
    pub fn retry(reason: impl Into<String>) -> Self {
        Disposition::Retry {
            reason: reason.into(),
        }
    }
}

/// Processes the payload of a single delivery.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Handles one message. Called at most once at a time per consumer.
    async fn handle(&self, message: &crate::Message) -> Disposition;
}

/// How many times a failing message is attempted before it is dead-lettered,
/// and how long to hold it before each retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy allowing `max_attempts` deliveries with no delay
    /// between them. Values below 1 are raised to 1.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Duration::ZERO,
        }
    }

    /// Waits `delay` times the attempt number before republishing a retry.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the retry numbered `attempt` is republished.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.delay.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Delay between consumer restarts after the delivery stream fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
        }
    }
}

/// Drives one queue, handing deliveries to a [`MessageHandler`] one at a time.
///
/// A delivery is acknowledged only after the handler returns. A
/// [`Disposition::Retry`] republishes the payload with its attempt counter
/// bumped, or moves it to the queue's dead-letter queue once the retry budget
/// is spent. Shutdown is checked between deliveries, so the message being
/// handled always finishes.
pub struct Consumer<H> {
    queue: String,
    handler: Arc<H>,
    policy: RetryPolicy,
}

impl<H: MessageHandler> Consumer<H> {
    pub fn new(queue: impl Into<String>, handler: Arc<H>, policy: RetryPolicy) -> Self {
        Self {
            queue: queue.into(),
            handler,
            policy,
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Consumes until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be declared or subscribed, if the
    /// delivery stream fails or ends, or if a delivery cannot be settled.
    #[tracing::instrument(skip_all, fields(queue = %self.queue, handler = self.handler.name()))]
    pub async fn run<C>(&self, channel: &C, shutdown: &mut watch::Receiver<bool>) -> Result<()>
    where
        C: MessageChannel + ?Sized,
    {
        channel.declare_queue(&self.queue).await?;
        channel.declare_queue(&dead_letter_queue(&self.queue)).await?;
        let mut deliveries = channel.subscribe(&self.queue).await?;

        tracing::info!(
            max_attempts = self.policy.max_attempts(),
            "consumer started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let next = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
                next = deliveries.next() => next,
            };

            match next {
                Some(Ok(delivery)) => self.process(channel, delivery, shutdown).await?,
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(ChannelError::Closed(format!(
                        "delivery stream for '{}' ended",
                        self.queue
                    )));
                }
            }
        }

        tracing::info!("consumer stopped");
        Ok(())
    }

    /// Like [`Consumer::run`], but restarts with exponential backoff whenever
    /// the run fails. Returns once shutdown is requested.
    pub async fn run_supervised<C>(
        &self,
        channel: &C,
        mut shutdown: watch::Receiver<bool>,
        backoff: Backoff,
    ) where
        C: MessageChannel + ?Sized,
    {
        let mut delay = backoff.initial;

        loop {
            match self.run(channel, &mut shutdown).await {
                Ok(()) => return,
                Err(e) => {
                    metrics::counter!("consumer_restarts_total", "queue" => self.queue.clone())
                        .increment(1);
                    tracing::error!(
                        queue = %self.queue,
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "consumer failed, restarting"
                    );
                }
            }

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
            if *shutdown.borrow() {
                return;
            }
            delay = (delay * 2).min(backoff.max);
        }
    }

    async fn process<C>(
        &self,
        channel: &C,
        delivery: Delivery,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()>
    where
        C: MessageChannel + ?Sized,
    {
        let started = Instant::now();
        let message = delivery.message().clone();

        tracing::debug!(
            attempt = message.attempt,
            redelivered = delivery.redelivered(),
            bytes = message.payload.len(),
            "delivery received"
        );
        metrics::counter!("messages_consumed_total", "queue" => self.queue.clone()).increment(1);

        match self.handler.handle(&message).await {
            Disposition::Ack => delivery.ack().await?,
            Disposition::Retry { reason } => {
                // The counter comes off the wire, so it may already be at the limit.
                let next_attempt = message.attempt.saturating_add(1);
                let retry = next_attempt < self.policy.max_attempts();
                let target = if retry {
                    self.queue.clone()
                } else {
                    dead_letter_queue(&self.queue)
                };

                if retry {
                    let delay = self.policy.delay_for(next_attempt);
                    tracing::warn!(
                        attempt = next_attempt,
                        delay_ms = delay.as_millis() as u64,
                        %reason,
                        "handler failed, scheduling retry"
                    );
                    metrics::counter!("messages_retried_total", "queue" => self.queue.clone())
                        .increment(1);

                    // A shutdown request cuts the wait short; the retry is still published.
                    if !delay.is_zero() && !*shutdown.borrow() {
                        tokio::select! {
                            () = tokio::time::sleep(delay) => {}
                            _ = shutdown.changed() => {}
                        }
                    }
                } else {
                    tracing::error!(
                        attempts = next_attempt,
                        %reason,
                        dead_letter_queue = %target,
                        "retry budget exhausted, dead-lettering message"
                    );
                    metrics::counter!("messages_dead_lettered_total", "queue" => self.queue.clone())
                        .increment(1);
                }

                match channel
                    .publish(&target, message.with_attempt(next_attempt))
                    .await
                {
                    Ok(()) => delivery.ack().await?,
                    Err(e) => {
                        // Hand the original back to the broker rather than lose it.
                        tracing::error!(error = %e, "failed to reschedule message, requeueing");
                        delivery.nack(true).await?;
                    }
                }
            }
        }

        metrics::histogram!("message_handler_duration_seconds", "queue" => self.queue.clone())
            .record(started.elapsed().as_secs_f64());
        Ok(())
    }
}
