use crate::library::helpers::parse_seconds;
use crate::module::options::{QueueingOptions, RedisOptions, TopicOptions};
use std::time::Duration;
use structopt::StructOpt;

/// Options for the gateway module
#[derive(Debug, StructOpt)]
pub struct Options {
    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub queueing: QueueingOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub redis: RedisOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub topics: TopicOptions,

    #[allow(missing_docs)]
    #[structopt(flatten)]
    pub timeouts: TimeoutOptions,

    /// Port to serve HTTP traffic on
    #[structopt(long, env, default_value = "8080")]
    pub port: u16,

    /// Services included in health reports
    #[structopt(
        long,
        env,
        use_delimiter = true,
        default_value = "catalog-service,transaction-service,user-service,notification-service,visualization-service"
    )]
    pub peers: Vec<String>,
}

/// Number of seconds to wait for the outcome of requests
#[derive(Debug, StructOpt)]
pub struct TimeoutOptions {
    /// Registrations may involve cold-starting the user service
    #[structopt(long, env, default_value = "120", parse(try_from_str = parse_seconds))]
    pub register_timeout: Duration,

    #[allow(missing_docs)]
    #[structopt(long, env, default_value = "30", parse(try_from_str = parse_seconds))]
    pub login_timeout: Duration,

    #[allow(missing_docs)]
    #[structopt(long, env, default_value = "120", parse(try_from_str = parse_seconds))]
    pub profile_timeout: Duration,

    #[allow(missing_docs)]
    #[structopt(long, env, default_value = "30", parse(try_from_str = parse_seconds))]
    pub logout_timeout: Duration,

    /// Duration of a probing round
    #[structopt(long, env, default_value = "15", parse(try_from_str = parse_seconds))]
    pub health_timeout: Duration,
}
