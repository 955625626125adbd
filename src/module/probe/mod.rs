//! Answers health probes on behalf of a service
//!
//! Every service joins a durable group of its own on the ping queue so that each one sees
//! every probe. Probes addressed to the service, or to everyone, are answered on the pong
//! queue with the outcome of a [`HealthCheck`].

mod health;
mod responder;

pub use health::*;
pub use responder::*;

use crate::domain::{ServiceIdentifier, Topics};
use crate::harness::{Service, ServiceRunner};
use crate::library::communication::event::{ConsumerGroupDescriptor, QueueDescriptor, QueueLocation};
use crate::library::communication::CommunicationFactory;

/// Parameters of a [`ProbeService`]
pub struct ProbeConfig<H> {
    /// Identifier replies are sent with
    pub service: ServiceIdentifier,
    /// Queue replies are published to
    pub pong: QueueDescriptor,
    /// Source of the reported status
    pub health: H,
}

/// [`Service`] answering probes, runs a [`ProbeResponder`]
pub struct ProbeService<H> {
    health: std::marker::PhantomData<fn() -> H>,
}

impl<F, H> Service<F> for ProbeService<H>
where
    F: CommunicationFactory + Send + Sync,
    H: HealthCheck + Clone + Send + Sync,
{
    const NAME: &'static str = "ProbeService";
    type Instance = ProbeResponder<F::Publisher, H>;
    type Config = ProbeConfig<H>;

    fn instantiate(factory: F, config: &Self::Config) -> Self::Instance {
        ProbeResponder::new(
            config.service.clone(),
            config.health.clone(),
            factory.publisher(),
            config.pong.clone(),
        )
    }
}

/// Creates a job answering probes sent to `service`
///
/// The durable group is named after the service so restarts resume where the previous instance left off.
pub fn probe_runner<F, H>(
    factory: F,
    topics: &Topics,
    service: &str,
    consumer: &str,
    health: H,
) -> ServiceRunner<ProbeService<H>, F>
where
    F: CommunicationFactory + Send + Sync,
    H: HealthCheck + Clone + Send + Sync,
{
    let group = ConsumerGroupDescriptor::durable(format!("{}-probe", service), QueueLocation::Tail);
    let config = ProbeConfig {
        service: service.to_owned(),
        pong: topics.pong.clone(),
        health,
    };

    ServiceRunner::new(factory, topics.ping.clone(), group, consumer.to_owned(), config)
}
