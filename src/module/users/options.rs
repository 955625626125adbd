use crate::library::helpers::parse_seconds;
use crate::module::options::{QueueingOptions, RedisOptions, TopicOptions};
use std::time::Duration;
use structopt::StructOpt;

/// Options for the users module
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
    pub accounts: AccountOptions,
}

/// Options for the account rules
#[derive(Debug, StructOpt)]
pub struct AccountOptions {
    /// Number of seconds a session stays valid after login
    #[structopt(long, env, default_value = "86400", parse(try_from_str = parse_seconds))]
    pub session_ttl: Duration,
}
