use super::event::{Publisher, QueueDescriptor, QueueProvider};
use super::request::{CompositeRequestor, CorrelationTracker};

/// Factory to create communication primitives for a specific message bus
pub trait CommunicationFactory {
    /// Provider to consume queues
    type QueueProvider: QueueProvider + Send + Sync;
    /// Publisher for messages of any kind
    type Publisher: Publisher + Send + Sync;

    /// Creates a new queue provider
    fn queue_provider(&self) -> Self::QueueProvider;

    /// Creates a new publisher
    fn publisher(&self) -> Self::Publisher;

    /// Creates a requestor which publishes to `requests` and awaits responses on `responses`.
    /// The `consumer` identifier is used as a prefix for the temporary consumer
    /// groups created while waiting.
    fn requestor(
        &self,
        requests: QueueDescriptor,
        responses: QueueDescriptor,
        consumer: &str,
    ) -> CompositeRequestor<Self::Publisher, Self::QueueProvider> {
        let tracker = CorrelationTracker::new(self.queue_provider(), responses, consumer);
        CompositeRequestor::new(self.publisher(), tracker, requests)
    }
}
