use super::super::json::JsonQueueEntry;
use super::{RedisFactory, RedisQueueError, STREAM_KEY_FIELD, STREAM_PAYLOAD_FIELD};
use crate::library::communication::event::RawQueueEntry;
use crate::library::EmptyResult;
use async_trait::async_trait;
use redis::streams::StreamId;
use redis::AsyncCommands;

/// Redis based implementation of the [`QueueEntry`](crate::library::communication::event::QueueEntry) trait
pub struct RedisQueueEntry<F> {
    factory: F,
    id: String,
    queue: String,
    group: String,
    key: String,
    payload: Vec<u8>,
}

impl<F> RedisQueueEntry<F>
where
    F: RedisFactory + Send + Sync,
{
    pub(super) fn new(
        factory: F,
        entry: StreamId,
        queue: String,
        group: String,
    ) -> Result<Self, RedisQueueError> {
        let payload = entry
            .get(STREAM_PAYLOAD_FIELD)
            .ok_or(RedisQueueError::MissingPayload)?;
        let key = entry.get(STREAM_KEY_FIELD).unwrap_or_default();

        Ok(Self {
            factory,
            id: entry.id,
            queue,
            group,
            key,
            payload,
        })
    }
}

#[async_trait]
impl<F> RawQueueEntry for RedisQueueEntry<F>
where
    F: RedisFactory + Send + Sync,
{
    fn key(&self) -> &str {
        &self.key
    }

    fn payload(&self) -> &[u8] {
        &self.payload
    }

    async fn acknowledge(&mut self) -> EmptyResult {
        let mut con = self.factory.multiplexed().await?;

        con.xack::<_, _, _, ()>(&self.queue, &self.group, &[&self.id])
            .await
            .map_err(|e| {
                self.factory.report_failure(&e);
                e
            })?;

        Ok(())
    }
}

impl<F> JsonQueueEntry for RedisQueueEntry<F> where F: RedisFactory + Send + Sync {}
