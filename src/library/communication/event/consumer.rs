use super::{
    ConsumerGroupDescriptor, QueueDescriptor, QueueEntry, QueueProvider, QueueSubscription,
    RawQueueEntry,
};
use crate::library::helpers::Backoff;
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::de::DeserializeOwned;
use std::any::type_name;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, instrument, warn};

const DEFAULT_CONCURRENCY: usize = 10;
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Entity which may consume and process messages from a queue
#[async_trait]
pub trait Consumer {
    /// Message to consume
    type Message: DeserializeOwned + Send;

    /// Converts a raw entry into a message, parsing it as JSON by default
    fn decode<E: QueueEntry>(&self, entry: &E) -> Result<Self::Message, BoxedError> {
        entry.parse_payload()
    }

    /// Processes a message and returns whether it succeeded or failed
    async fn consume(&self, message: Self::Message) -> EmptyResult;
}

/// Helper functions to aid the consumption of messages
#[async_trait]
pub trait ConsumerExt {
    /// Consumes messages from a queue using the given provider until the surrounding future is dropped.
    ///
    /// Every entry is acknowledged once it has been handled, regardless of whether it could be decoded
    /// or processed. Failures are logged. Errors reading from the bus are retried with an exponential backoff.
    async fn consume_queue<Q>(
        &self,
        provider: &Q,
        queue: &QueueDescriptor,
        group: &ConsumerGroupDescriptor,
        consumer: &str,
    ) -> EmptyResult
    where
        Q: QueueProvider + Send + Sync;
}

#[async_trait]
impl<C> ConsumerExt for C
where
    C: Consumer + Send + Sync,
{
    #[instrument(skip(self, provider, queue, group), fields(queue = queue.key(), group = group.identifier()))]
    async fn consume_queue<Q>(
        &self,
        provider: &Q,
        queue: &QueueDescriptor,
        group: &ConsumerGroupDescriptor,
        consumer: &str,
    ) -> EmptyResult
    where
        Q: QueueProvider + Send + Sync,
    {
        let subscription = subscribe_with_retry(provider, queue, group, consumer).await;
        debug!(kind = type_name::<C::Message>(), "Consuming queue");

        let entries = stream::unfold(
            (subscription, Backoff::default()),
            |(mut subscription, mut backoff)| async move {
                loop {
                    let deadline = Instant::now() + DEFAULT_READ_TIMEOUT;

                    match subscription.next_before(deadline).await {
                        Ok(Some(entry)) => {
                            backoff.reset();
                            return Some((entry, (subscription, backoff)));
                        }
                        Ok(None) => {}
                        Err(error) => {
                            let delay = backoff.next().unwrap_or(DEFAULT_READ_TIMEOUT);
                            warn!(%error, ?delay, "Failed to read from queue");
                            sleep(delay).await;
                        }
                    }
                }
            },
        );

        entries
            .for_each_concurrent(Some(DEFAULT_CONCURRENCY), |mut entry| async move {
                match self.decode(&entry) {
                    Ok(message) => {
                        if let Err(error) = self.consume(message).await {
                            warn!(%error, kind = type_name::<C::Message>(), "Failed to consume message, dropping it");
                        }
                    }
                    Err(error) => {
                        warn!(%error, kind = type_name::<C::Message>(), "Failed to decode message, skipping it")
                    }
                }

                if let Err(error) = entry.acknowledge().await {
                    warn!(%error, "Failed to acknowledge message");
                }
            })
            .await;

        Ok(())
    }
}

async fn subscribe_with_retry<Q: QueueProvider>(
    provider: &Q,
    queue: &QueueDescriptor,
    group: &ConsumerGroupDescriptor,
    consumer: &str,
) -> Q::Subscription {
    let mut backoff = Backoff::default();

    loop {
        match provider.subscribe(queue, group, consumer).await {
            Ok(subscription) => return subscription,
            Err(error) => {
                let delay = backoff.next().unwrap_or(DEFAULT_READ_TIMEOUT);
                warn!(%error, ?delay, "Failed to subscribe to queue");
                sleep(delay).await;
            }
        }
    }
}
