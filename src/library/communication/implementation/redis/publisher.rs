use super::super::json::JsonPublisher;
use super::{RedisFactory, STREAM_ID_NEW, STREAM_KEY_FIELD, STREAM_PAYLOAD_FIELD};
use crate::library::communication::event::{QueueDescriptor, RawPublisher};
use crate::library::EmptyResult;
use async_trait::async_trait;
use redis::streams::StreamMaxlen;
use redis::AsyncCommands;

/// [`Publisher`](super::super::super::event::Publisher) implementation using [`XADD`](https://redis.io/commands/xadd)
#[derive(Clone)]
pub struct RedisPublisher<F: RedisFactory> {
    factory: F,
}

impl<F> RedisPublisher<F>
where
    F: RedisFactory,
{
    /// Creates a new instance which obtains connections from the given factory
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

impl<F> JsonPublisher for RedisPublisher<F> where F: RedisFactory + Send + Sync {}

#[async_trait]
impl<F> RawPublisher for RedisPublisher<F>
where
    F: RedisFactory + Send + Sync,
{
    async fn publish_raw(&self, queue: &QueueDescriptor, key: &str, data: &[u8]) -> EmptyResult {
        let limit = StreamMaxlen::Approx(queue.limit());
        let mut con = self.factory.multiplexed().await?;

        con.xadd_maxlen::<_, _, _, _, ()>(
            queue.key(),
            limit,
            STREAM_ID_NEW,
            &[
                (STREAM_KEY_FIELD, key.as_bytes()),
                (STREAM_PAYLOAD_FIELD, data),
            ],
        )
        .await
        .map_err(|e| {
            self.factory.report_failure(&e);
            e
        })?;

        Ok(())
    }
}
