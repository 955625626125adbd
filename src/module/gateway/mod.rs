//! HTTP ingress translating calls into requests on the bus
//!
//! Account related calls are forwarded to the user service as [`RequestEnvelopes`](crate::domain::RequestEnvelope)
//! and their outcome is awaited using a correlation id. Health reports are assembled by probing all known
//! services and collecting their replies for a limited time.

use crate::domain::Topics;
use crate::harness::{Heart, Module, RedisCommunicationFactory};
use crate::library::communication::request::CompositeRequestor;
use crate::library::communication::CommunicationFactory;
use crate::library::BoxedError;
use async_trait::async_trait;
use jatsl::{schedule, JobScheduler};
use tracing::debug;

mod dispatch;
mod health;
mod options;
mod server;

pub use dispatch::*;
pub use health::*;
pub use options::*;
pub use server::*;

impl From<&TimeoutOptions> for Timeouts {
    fn from(options: &TimeoutOptions) -> Self {
        Self {
            register: options.register_timeout,
            login: options.login_timeout,
            profile: options.profile_timeout,
            logout: options.logout_timeout,
            health: options.health_timeout,
        }
    }
}

/// Builds the job serving the gateway on top of any message bus
pub fn server_job<F>(
    factory: &F,
    topics: &Topics,
    consumer: &str,
    port: u16,
    peers: Vec<String>,
    timeouts: Timeouts,
) -> ServerJob<
    CompositeRequestor<F::Publisher, F::QueueProvider>,
    F::Publisher,
    F::QueueProvider,
>
where
    F: CommunicationFactory,
{
    let users = UserGateway::new(factory.requestor(
        topics.requests.clone(),
        topics.responses.clone(),
        consumer,
    ));
    let health = HealthAggregator::new(
        factory.publisher(),
        factory.queue_provider(),
        topics.ping.clone(),
        topics.pong.clone(),
        consumer,
    );

    ServerJob::new(port, GatewayContext::new(users, health, peers, timeouts))
}

/// Module implementation
pub struct Gateway {
    options: Options,
}

impl Gateway {
    /// Creates a new instance from raw parts
    pub fn new(options: Options) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Module for Gateway {
    async fn run(&mut self, scheduler: &JobScheduler) -> Result<Option<Heart>, BoxedError> {
        let factory = RedisCommunicationFactory::new(&self.options.redis.url)?;
        let server_job = server_job(
            &factory,
            &self.options.topics.topics(),
            &self.options.queueing.id,
            self.options.port,
            self.options.peers.clone(),
            Timeouts::from(&self.options.timeouts),
        );

        debug!(peers = ?self.options.peers, "Scheduling jobs");
        schedule!(scheduler, { server_job });

        Ok(Some(Heart::without_heart_stone()))
    }
}
