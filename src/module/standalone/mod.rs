//! All services in a single process
//!
//! Runs the gateway, the user service and probe responders for the remaining peers on top of an
//! in-memory bus. Nothing is persisted, which makes it suitable for local development and demos.

use crate::constants::SERVICE_USERS;
use crate::domain::Topics;
use crate::harness::{Heart, Module};
use crate::library::communication::implementation::memory::MemoryBus;
use crate::library::BoxedError;
use crate::module::gateway::{server_job, TimeoutOptions, Timeouts};
use crate::module::probe::{probe_runner, AlwaysHealthy};
use crate::module::users::{
    AccountOptions, Accounts, MemorySessionStore, MemoryUserStore, UserJobs,
};
use async_trait::async_trait;
use jatsl::{schedule, JobScheduler};
use structopt::StructOpt;
use tracing::{debug, info};

const INSTANCE: &str = "standalone";

/// Options for the standalone module
#[derive(Debug, StructOpt)]
pub struct Options {
    /// Port to serve HTTP traffic on
    #[structopt(long, env, default_value = "8080")]
    pub port: u16,

    /// Services included in health reports, all but the user service are simulated
    #[structopt(
        long,
        env,
        use_delimiter = true,
        default_value = "catalog-service,transaction-service,user-service,notification-service,visualization-service"
    )]
    pub peers: Vec<String>,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub timeouts: TimeoutOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub accounts: AccountOptions,
}

/// Module implementation
pub struct Standalone {
    options: Options,
}

impl Standalone {
    /// Creates a new instance from raw parts
    pub fn new(options: Options) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Module for Standalone {
    async fn run(&mut self, scheduler: &JobScheduler) -> Result<Option<Heart>, BoxedError> {
        let bus = MemoryBus::default();
        let topics = Topics::default();

        let server_job = server_job(
            &bus,
            &topics,
            INSTANCE,
            self.options.port,
            self.options.peers.clone(),
            Timeouts::from(&self.options.timeouts),
        );

        let accounts = Accounts::new(
            MemoryUserStore::default(),
            MemorySessionStore::default(),
            self.options.accounts.session_ttl,
        );
        let UserJobs { worker, probe } = UserJobs::new(bus.clone(), &topics, INSTANCE, accounts);

        debug!("Scheduling jobs");
        schedule!(scheduler, { server_job, worker, probe });

        for peer in self.options.peers.iter().filter(|peer| *peer != SERVICE_USERS) {
            info!(peer = %peer, "Simulating peer");
            let runner = probe_runner(bus.clone(), &topics, peer, INSTANCE, AlwaysHealthy);
            scheduler.spawn_job(runner).await;
        }

        Ok(Some(Heart::without_heart_stone()))
    }
}
