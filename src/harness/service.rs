use crate::library::communication::event::{ConsumerExt, ConsumerGroupDescriptor, QueueDescriptor};
use crate::library::communication::CommunicationFactory;
use crate::library::EmptyResult;
use async_trait::async_trait;
use jatsl::{Job, JobManager};
use std::marker::PhantomData;

/// Structure which can be instantiated with a [`CommunicationFactory`]
pub trait Service<F: CommunicationFactory + Send + Sync> {
    /// Name of the service displayed in log messages
    const NAME: &'static str;
    /// Instance type which will be instantiated
    type Instance: Send + Sync;
    /// Configuration type passed to the service
    type Config: Send + Sync;

    /// Creates a new instance which could be of a different type.
    /// This is common when `Self: RequestProcessor` where this
    /// function would return an instance of [`Responder`](crate::library::communication::request::Responder)
    /// containing an instance of `Self`.
    fn instantiate(factory: F, config: &Self::Config) -> Self::Instance;
}

/// Job running a [`Service`] whose [`Service::Instance`] consumes a queue
pub struct ServiceRunner<S, F>
where
    S: Service<F>,
    F: CommunicationFactory + Send + Sync,
{
    factory: F,
    queue: QueueDescriptor,
    group: ConsumerGroupDescriptor,
    consumer: String,
    config: S::Config,
    service: PhantomData<fn() -> S>,
}

impl<S, F> ServiceRunner<S, F>
where
    S: Service<F>,
    S::Instance: ConsumerExt,
    F: CommunicationFactory + Send + Sync,
{
    /// Creates a new runner which consumes the queue as a member of the given group
    pub fn new(
        factory: F,
        queue: QueueDescriptor,
        group: ConsumerGroupDescriptor,
        consumer: String,
        config: S::Config,
    ) -> Self {
        Self {
            factory,
            queue,
            group,
            consumer,
            config,
            service: PhantomData,
        }
    }
}

#[async_trait]
impl<S, F> Job for ServiceRunner<S, F>
where
    S: Service<F> + Send + Sync,
    S::Instance: ConsumerExt,
    F: CommunicationFactory + Clone + Send + Sync,
{
    const NAME: &'static str = "ServiceRunner";

    fn name(&self) -> String {
        format!("{}({})", Self::NAME, S::NAME)
    }

    async fn execute(&self, manager: JobManager) -> EmptyResult {
        let provider = self.factory.queue_provider();
        let service = S::instantiate(self.factory.clone(), &self.config);

        manager.ready().await;

        service
            .consume_queue(&provider, &self.queue, &self.group, &self.consumer)
            .await
    }
}
