//! Participant in health reporting without further functionality
//!
//! Stands in for services which only need to answer probes, like the catalog or notification services.

use crate::harness::{Heart, Module, RedisCommunicationFactory};
use crate::library::BoxedError;
use crate::module::options::{QueueingOptions, RedisOptions, TopicOptions};
use crate::module::probe::{probe_runner, AlwaysHealthy};
use async_trait::async_trait;
use jatsl::{schedule, JobScheduler};
use structopt::StructOpt;
use tracing::debug;

/// Options for the peer module
#[derive(Debug, StructOpt)]
pub struct Options {
    /// Identifier the service replies to probes with
    #[structopt(long, env = "SERVICE_NAME", value_name = "service")]
    pub name: String,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub queueing: QueueingOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub redis: RedisOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub topics: TopicOptions,
}

/// Module implementation
pub struct Peer {
    options: Options,
}

impl Peer {
    /// Creates a new instance from raw parts
    pub fn new(options: Options) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Module for Peer {
    async fn run(&mut self, scheduler: &JobScheduler) -> Result<Option<Heart>, BoxedError> {
        let factory = RedisCommunicationFactory::new(&self.options.redis.url)?;
        let probe = probe_runner(
            factory,
            &self.options.topics.topics(),
            &self.options.name,
            &self.options.queueing.id,
            AlwaysHealthy,
        );

        debug!(service = %self.options.name, "Scheduling jobs");
        schedule!(scheduler, { probe });

        Ok(Some(Heart::without_heart_stone()))
    }
}
