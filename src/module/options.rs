//! Various options usable by modules
//!
//! The structs in this module allow other modules to flatten them into
//! their own options struct. This allows for a unified yet non-cluttered
//! option set.

use crate::domain::Topics;
use crate::library::communication::event::QueueDescriptor;
use structopt::StructOpt;

/// Options for connecting to the Redis server
#[derive(Debug, StructOpt)]
pub struct RedisOptions {
    /// Redis database server URL
    #[structopt(
        short = "r",
        long = "redis",
        env = "REDIS",
        default_value = "redis://localhost/",
        value_name = "url"
    )]
    pub url: String,
}

/// Options relevant for message queueing
#[derive(Debug, StructOpt)]
pub struct QueueingOptions {
    /// Unique and stable identifier for this instance.
    /// It is used to identify and resume work after a crash
    /// or deliberate restart, thus it may not change across
    /// executions!
    #[structopt(long, env)]
    pub id: String,
}

/// Names of the queues used to communicate
#[derive(Debug, StructOpt)]
pub struct TopicOptions {
    /// Queue carrying user requests
    #[structopt(long, env, default_value = "user-requests", value_name = "key")]
    pub request_topic: String,

    /// Queue carrying responses to user requests
    #[structopt(long, env, default_value = "user-responses", value_name = "key")]
    pub response_topic: String,

    /// Queue carrying health probes
    #[structopt(long, env, default_value = "service-ping", value_name = "key")]
    pub ping_topic: String,

    /// Queue carrying replies to health probes
    #[structopt(long, env, default_value = "service-pong", value_name = "key")]
    pub pong_topic: String,

    /// Approximate number of messages retained per queue
    #[structopt(long, env, default_value = "10000")]
    pub topic_limit: usize,
}

impl TopicOptions {
    /// Builds the queue descriptors from the configured names
    pub fn topics(&self) -> Topics {
        let queue = |key: &str| QueueDescriptor::new(key.to_owned(), self.topic_limit);

        Topics {
            requests: queue(&self.request_topic),
            responses: queue(&self.response_topic),
            ping: queue(&self.ping_topic),
            pong: queue(&self.pong_topic),
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, StructOpt)]
    struct Wrapper {
        #[structopt(flatten)]
        topics: TopicOptions,
    }

    #[test]
    fn default_to_the_well_known_topics() {
        let options = Wrapper::from_iter(vec!["test"]);

        assert_eq!(options.topics.topics(), Topics::default());
    }

    #[test]
    fn apply_custom_topic_names() {
        let options = Wrapper::from_iter(vec!["test", "--ping-topic", "probes", "--topic-limit", "5"]);
        let topics = options.topics.topics();

        assert_eq!(topics.ping, QueueDescriptor::new("probes".into(), 5));
        assert_eq!(topics.requests.key(), "user-requests");
    }
}
