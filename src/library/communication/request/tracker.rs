use super::Correlated;
use crate::library::communication::event::{
    release, subscribe_before, ConsumerGroupDescriptor, ConsumerIdentifier, QueueDescriptor,
    QueueEntry, QueueProvider, QueueSubscription, RawQueueEntry,
};
use crate::library::helpers::Backoff;
use crate::library::BoxedError;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, instrument, trace, warn};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Error that may occur while waiting for a response
#[derive(Error, Debug)]
pub enum CollectionError {
    /// No matching response arrived in time
    #[error("no matching response received within {0:?}")]
    Timeout(Duration),
    /// Unable to start listening on the response queue
    #[error("unable to subscribe to the response queue")]
    SubscriptionFailed(#[source] BoxedError),
}

/// Waits for responses on a queue and matches them to requests by their correlation id
///
/// Every waiter joins an [ephemeral](ConsumerGroupDescriptor::ephemeral) consumer group of its own.
/// Thus it sees every response published after it started listening and never takes a response
/// away from another waiter.
pub struct CorrelationTracker<Q> {
    provider: Q,
    queue: QueueDescriptor,
    consumer: ConsumerIdentifier,
    poll_interval: Duration,
}

impl<Q> CorrelationTracker<Q>
where
    Q: QueueProvider + Send + Sync,
{
    /// Creates a new tracker listening on the given response queue
    pub fn new(provider: Q, queue: QueueDescriptor, consumer: &str) -> Self {
        Self {
            provider,
            queue,
            consumer: consumer.to_owned(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Upper bound for a single read, also limits the delay between retries when the bus is unavailable
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Starts listening for a response with the given correlation id.
    ///
    /// Responses published after this method returns are guaranteed to be seen by the returned handle.
    pub async fn listen<R>(
        &self,
        correlation_id: &str,
    ) -> Result<PendingResponse<Q::Subscription, R>, CollectionError>
    where
        R: DeserializeOwned + Correlated + Send,
    {
        let group = ConsumerGroupDescriptor::ephemeral(&self.consumer);
        let subscription = self
            .provider
            .subscribe(&self.queue, &group, &self.consumer)
            .await
            .map_err(CollectionError::SubscriptionFailed)?;

        Ok(self.pending(subscription, &group, correlation_id))
    }

    /// Same as [`listen`](CorrelationTracker::listen) but fails once the deadline passes
    /// without the bus accepting the subscription
    pub async fn listen_before<R>(
        &self,
        correlation_id: &str,
        deadline: Instant,
    ) -> Result<PendingResponse<Q::Subscription, R>, CollectionError>
    where
        R: DeserializeOwned + Correlated + Send,
    {
        let group = ConsumerGroupDescriptor::ephemeral(&self.consumer);
        let subscription =
            subscribe_before(&self.provider, &self.queue, &group, &self.consumer, deadline)
                .await
                .map_err(CollectionError::SubscriptionFailed)?;

        Ok(self.pending(subscription, &group, correlation_id))
    }

    /// Waits for a response with the given correlation id which has been published after this call
    ///
    /// Returns no later than shortly after `timeout`, even when the bus stops answering.
    pub async fn await_response<R>(
        &self,
        correlation_id: &str,
        timeout: Duration,
    ) -> Result<R, CollectionError>
    where
        R: DeserializeOwned + Correlated + Send,
    {
        let deadline = Instant::now() + timeout;

        self.listen_before(correlation_id, deadline)
            .await?
            .wait_until(deadline)
            .await
            .ok_or(CollectionError::Timeout(timeout))
    }

    fn pending<R>(
        &self,
        subscription: Q::Subscription,
        group: &ConsumerGroupDescriptor,
        correlation_id: &str,
    ) -> PendingResponse<Q::Subscription, R> {
        trace!(correlation_id, group = group.identifier(), "Listening for response");

        PendingResponse {
            subscription,
            correlation_id: correlation_id.to_owned(),
            poll_interval: self.poll_interval,
            phantom: PhantomData,
        }
    }
}

/// Active listener for a single response
///
/// Dropping it without calling [`wait`](PendingResponse::wait) or [`close`](PendingResponse::close)
/// releases the underlying consumer group on a best-effort basis.
pub struct PendingResponse<S, R> {
    subscription: S,
    correlation_id: String,
    poll_interval: Duration,
    phantom: PhantomData<fn() -> R>,
}

impl<S, R> PendingResponse<S, R>
where
    S: QueueSubscription,
    R: DeserializeOwned + Correlated + Send,
{
    /// Correlation id this handle is waiting for
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Reads responses until one matches or the timeout elapses and releases the consumer group afterwards
    pub async fn wait(self, timeout: Duration) -> Result<R, CollectionError> {
        self.wait_until(Instant::now() + timeout)
            .await
            .ok_or(CollectionError::Timeout(timeout))
    }

    /// Reads responses until one matches or the deadline passes and releases the consumer group afterwards
    #[instrument(skip(self), fields(correlation_id = %self.correlation_id))]
    pub async fn wait_until(mut self, deadline: Instant) -> Option<R> {
        let outcome = self.collect(deadline).await;

        if outcome.is_none() {
            debug!("No matching response received");
        }

        self.close().await;
        outcome
    }

    /// Stops listening without waiting for a response
    pub async fn close(self) {
        if let Err(error) = release(self.subscription).await {
            warn!(%error, "Failed to release response consumer group");
        }
    }

    async fn collect(&mut self, deadline: Instant) -> Option<R> {
        let mut backoff = Backoff::default().with_ceiling(self.poll_interval);

        loop {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }

            let read_deadline = (now + self.poll_interval).min(deadline);

            // Bounds reconnects of the subscription as well
            let read = match timeout_at(deadline, self.subscription.next_before(read_deadline)).await {
                Ok(read) => read,
                Err(_) => return None,
            };

            match read {
                Ok(Some(mut entry)) => {
                    backoff.reset();

                    let parsed = entry.parse_payload::<R>();

                    match timeout_at(deadline, entry.acknowledge()).await {
                        Ok(Err(error)) => debug!(%error, "Failed to acknowledge response"),
                        Err(_) => debug!("Acknowledging response did not finish in time"),
                        Ok(Ok(())) => {}
                    }

                    match parsed {
                        Ok(response) if response.correlation_id() == self.correlation_id => {
                            return Some(response)
                        }
                        Ok(response) => {
                            trace!(other = response.correlation_id(), "Discarding unrelated response")
                        }
                        Err(error) => warn!(%error, key = entry.key(), "Skipping malformed response"),
                    }
                }
                Ok(None) => {}
                Err(error) => {
                    let delay = backoff.next().unwrap_or(self.poll_interval);
                    warn!(%error, ?delay, "Failed to read responses, retrying");
                    sleep_until((Instant::now() + delay).min(deadline)).await;
                }
            }
        }
    }
}
