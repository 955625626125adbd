//! Message bus which accepts every call but never answers, for testing deadlines

use super::json::JsonPublisher;
use super::memory::MemoryQueueEntry;
use crate::library::communication::event::{
    ConsumerGroupDescriptor, QueueDescriptor, QueueProvider, QueueSubscription, RawPublisher,
};
use crate::library::communication::CommunicationFactory;
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use futures::future::pending;
use tokio::time::Instant;

/// Bus whose operations hang forever, like a redis server that stopped responding
#[derive(Clone, Copy)]
pub struct UnresponsiveBus {
    accept_subscriptions: bool,
}

impl UnresponsiveBus {
    /// Subscribing never completes
    pub fn stalling_subscriptions() -> Self {
        Self {
            accept_subscriptions: false,
        }
    }

    /// Subscribing succeeds but reading from or closing the subscription never completes
    pub fn stalling_reads() -> Self {
        Self {
            accept_subscriptions: true,
        }
    }
}

/// Subscription of the [`UnresponsiveBus`]
pub struct StalledSubscription;

#[async_trait]
impl QueueSubscription for StalledSubscription {
    type Entry = MemoryQueueEntry;

    async fn next_before(&mut self, _deadline: Instant) -> Result<Option<Self::Entry>, BoxedError> {
        pending().await
    }

    async fn close(self) -> EmptyResult {
        pending().await
    }
}

#[async_trait]
impl QueueProvider for UnresponsiveBus {
    type Entry = MemoryQueueEntry;
    type Subscription = StalledSubscription;

    async fn subscribe(
        &self,
        _queue: &QueueDescriptor,
        _group: &ConsumerGroupDescriptor,
        _consumer: &str,
    ) -> Result<Self::Subscription, BoxedError> {
        if self.accept_subscriptions {
            Ok(StalledSubscription)
        } else {
            pending().await
        }
    }
}

#[async_trait]
impl RawPublisher for UnresponsiveBus {
    async fn publish_raw(&self, _queue: &QueueDescriptor, _key: &str, _data: &[u8]) -> EmptyResult {
        pending().await
    }
}

impl JsonPublisher for UnresponsiveBus {}

impl CommunicationFactory for UnresponsiveBus {
    type QueueProvider = UnresponsiveBus;
    type Publisher = UnresponsiveBus;

    fn queue_provider(&self) -> Self::QueueProvider {
        *self
    }

    fn publisher(&self) -> Self::Publisher {
        *self
    }
}
