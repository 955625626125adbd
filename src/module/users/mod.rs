//! Account management service
//!
//! Consumes user requests in a shared consumer group so that multiple instances split the
//! load, applies the account rules and publishes the outcome for the gateway to pick up.
//! Accounts are kept in memory while sessions are stored in redis.

use crate::constants::SERVICE_USERS;
use crate::domain::{HealthStatus, Topics};
use crate::harness::{Heart, Module, RedisCommunicationFactory, ServiceRunner};
use crate::library::communication::event::{ConsumerGroupDescriptor, QueueLocation};
use crate::library::communication::CommunicationFactory;
use crate::library::BoxedError;
use crate::module::probe::{probe_runner, HealthCheck, ProbeService};
use async_trait::async_trait;
use jatsl::{schedule, JobScheduler};
use tracing::{debug, warn};

mod accounts;
mod options;
mod service;
mod sessions;
mod store;

pub use accounts::*;
pub use options::*;
pub use service::*;
pub use sessions::*;
pub use store::*;

/// Reports the reachability of the session storage
#[derive(Clone)]
pub struct SessionStoreHealth<S> {
    sessions: S,
}

impl<S> SessionStoreHealth<S> {
    /// Creates a new check for the given store
    pub fn new(sessions: S) -> Self {
        Self { sessions }
    }
}

#[async_trait]
impl<S> HealthCheck for SessionStoreHealth<S>
where
    S: SessionStore + Send + Sync,
{
    async fn status(&self) -> HealthStatus {
        match self.sessions.ping().await {
            Ok(()) => HealthStatus::Healthy,
            Err(error) => {
                warn!(%error, "Session storage unreachable");
                HealthStatus::Unhealthy
            }
        }
    }
}

/// Jobs making up the user service
pub struct UserJobs<F, U, S>
where
    F: CommunicationFactory + Send + Sync,
    U: UserStore + Clone + Send + Sync,
    S: SessionStore + Clone + Send + Sync,
{
    /// Consumes and answers user requests
    pub worker: ServiceRunner<UserService<U, S>, F>,
    /// Answers health probes
    pub probe: ServiceRunner<ProbeService<SessionStoreHealth<S>>, F>,
}

impl<F, U, S> UserJobs<F, U, S>
where
    F: CommunicationFactory + Clone + Send + Sync,
    U: UserStore + Clone + Send + Sync,
    S: SessionStore + Clone + Send + Sync,
{
    /// Creates the jobs for an instance with the given consumer identifier
    pub fn new(factory: F, topics: &Topics, consumer: &str, accounts: Accounts<U, S>) -> Self {
        let health = SessionStoreHealth::new(accounts.sessions().clone());
        let probe = probe_runner(factory.clone(), topics, SERVICE_USERS, consumer, health);

        let group = ConsumerGroupDescriptor::durable(SERVICE_USERS, QueueLocation::Tail);
        let config = UserServiceConfig {
            accounts,
            responses: topics.responses.clone(),
        };
        let worker = ServiceRunner::new(
            factory,
            topics.requests.clone(),
            group,
            consumer.to_owned(),
            config,
        );

        Self { worker, probe }
    }
}

/// Module implementation
pub struct Users {
    options: Options,
}

impl Users {
    /// Creates a new instance from raw parts
    pub fn new(options: Options) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Module for Users {
    async fn run(&mut self, scheduler: &JobScheduler) -> Result<Option<Heart>, BoxedError> {
        let factory = RedisCommunicationFactory::new(&self.options.redis.url)?;
        let sessions = RedisSessionStore::new(factory.connections().clone());
        let accounts = Accounts::new(
            MemoryUserStore::default(),
            sessions,
            self.options.accounts.session_ttl,
        );

        let UserJobs { worker, probe } = UserJobs::new(
            factory,
            &self.options.topics.topics(),
            &self.options.queueing.id,
            accounts,
        );

        debug!("Scheduling jobs");
        schedule!(scheduler, { worker, probe });

        Ok(Some(Heart::without_heart_stone()))
    }
}
