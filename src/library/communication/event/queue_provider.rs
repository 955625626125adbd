use super::{ConsumerGroupDescriptor, QueueDescriptor, QueueEntry};
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{timeout, timeout_at, Instant};

/// Allows consumption of message queues using [consumer groups](ConsumerGroupDescriptor)
#[async_trait]
pub trait QueueProvider {
    /// Type of [`QueueEntry`] returned by the provider
    type Entry: QueueEntry + Send + Sync;
    /// Handle to an active subscription
    type Subscription: QueueSubscription<Entry = Self::Entry>;

    /// Joins the specified [`ConsumerGroup`](ConsumerGroupDescriptor) with the given
    /// [`ConsumerIdentifier`](super::ConsumerIdentifier), creating the queue and group if they do not exist.
    ///
    /// Once this method returns, the group is registered on the bus and will
    /// see every message published from then on.
    async fn subscribe(
        &self,
        queue: &QueueDescriptor,
        group: &ConsumerGroupDescriptor,
        consumer: &str,
    ) -> Result<Self::Subscription, BoxedError>;
}

/// Membership of a consumer in a consumer group
///
/// Entries that were delivered to the consumer earlier but never acknowledged are
/// returned first, new entries afterwards. Dropping a subscription of an ephemeral
/// group without closing it releases the group on a best-effort basis.
#[async_trait]
pub trait QueueSubscription: Send {
    /// Type of [`QueueEntry`] returned by the subscription
    type Entry: QueueEntry + Send + Sync;

    /// Waits for the next entry until the deadline passes.
    ///
    /// Returns `Ok(None)` if no entry arrived in time.
    async fn next_before(&mut self, deadline: Instant) -> Result<Option<Self::Entry>, BoxedError>;

    /// Leaves the group, removing it from the bus if it is ephemeral
    async fn close(self) -> EmptyResult;
}

/// Raised when the bus does not complete an operation before the caller's deadline
#[derive(Debug, Error)]
#[error("message bus did not answer before the deadline")]
pub struct DeadlineExceeded;

/// Time granted to [`release`] before the group is left to the subscription's drop handler
pub const RELEASE_TIMEOUT: Duration = Duration::from_millis(250);

/// Subscribes like [`QueueProvider::subscribe`] but gives up once the deadline passes
pub async fn subscribe_before<Q: QueueProvider>(
    provider: &Q,
    queue: &QueueDescriptor,
    group: &ConsumerGroupDescriptor,
    consumer: &str,
    deadline: Instant,
) -> Result<Q::Subscription, BoxedError> {
    timeout_at(deadline, provider.subscribe(queue, group, consumer))
        .await
        .map_err(|_| DeadlineExceeded)?
}

/// Closes a subscription without waiting longer than [`RELEASE_TIMEOUT`] for the bus
///
/// If the bus is too slow, the close is abandoned and the group is released when the
/// subscription is dropped.
pub async fn release<S: QueueSubscription>(subscription: S) -> EmptyResult {
    timeout(RELEASE_TIMEOUT, subscription.close())
        .await
        .map_err(|_| DeadlineExceeded)?
}
