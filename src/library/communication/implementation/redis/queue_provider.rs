use super::{
    RedisFactory, RedisQueueEntry, RedisQueueError, STREAM_ID_ADDITIONS, STREAM_ID_HEAD,
    STREAM_ID_TAIL,
};
use crate::library::communication::event::{
    ConsumerGroupDescriptor, QueueDescriptor, QueueLocation, QueueProvider, QueueSubscription,
};
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use redis::aio::{Connection, ConnectionLike};
use redis::streams::{StreamId, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use std::collections::VecDeque;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

const DEFAULT_BATCH_SIZE: usize = 10;

/// Queue provider implementation using [Redis Streams](https://redis.io/topics/streams-intro)
pub struct RedisQueueProvider<F> {
    factory: F,
}

impl<F: RedisFactory + Clone + Send + Sync + 'static> RedisQueueProvider<F> {
    /// Creates a new instance with a given [`RedisFactory`]
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl<F> QueueProvider for RedisQueueProvider<F>
where
    F: RedisFactory + Clone + Send + Sync + 'static,
{
    type Entry = RedisQueueEntry<F>;
    type Subscription = RedisQueueSubscription<F>;

    /// Creates the stream and consumer group if they do not exist and opens a dedicated connection for the blocking reads
    async fn subscribe(
        &self,
        queue: &QueueDescriptor,
        group: &ConsumerGroupDescriptor,
        consumer: &str,
    ) -> Result<Self::Subscription, BoxedError> {
        let mut con = self.factory.owned().await?;
        create_consumer_group(&mut con, queue.key(), group).await;

        Ok(RedisQueueSubscription {
            factory: self.factory.clone(),
            con: Some(con),
            key: queue.key().to_owned(),
            group: group.clone(),
            consumer: consumer.to_owned(),
            cursor: STREAM_ID_HEAD.to_owned(),
            buffer: VecDeque::new(),
            closed: false,
        })
    }
}

/// Membership of a consumer in a stream consumer group
///
/// Reads entries that are pending for this consumer first and switches
/// to new entries once those are exhausted, resembling the way a consumer
/// resumes work after a crash. A broken connection is replaced on the next read.
pub struct RedisQueueSubscription<F: RedisFactory + Clone + Send + Sync + 'static> {
    factory: F,
    con: Option<Connection>,
    key: String,
    group: ConsumerGroupDescriptor,
    consumer: String,
    cursor: String,
    buffer: VecDeque<StreamId>,
    closed: bool,
}

impl<F> RedisQueueSubscription<F>
where
    F: RedisFactory + Clone + Send + Sync + 'static,
{
    async fn connection(&mut self) -> Result<&mut Connection, BoxedError> {
        if self.con.is_none() {
            debug!(key = %self.key, "Reconnecting subscription");
            let mut con = self.factory.owned().await?;
            create_consumer_group(&mut con, &self.key, &self.group).await;
            self.cursor = STREAM_ID_HEAD.to_owned();
            self.con = Some(con);
        }

        self.con
            .as_mut()
            .ok_or_else(|| "redis connection unavailable".into())
    }

    async fn read(&mut self, block: usize) -> Result<Vec<StreamId>, BoxedError> {
        let options = StreamReadOptions::default()
            .group(self.group.identifier(), &self.consumer)
            .count(DEFAULT_BATCH_SIZE)
            .block(block);
        let key = self.key.clone();
        let cursor = self.cursor.clone();
        let con = self.connection().await?;

        let result = con
            .xread_options::<_, _, Option<StreamReadReply>>(&[&key], &[&cursor], &options)
            .await;

        match result {
            Ok(reply) => Ok(reply
                .and_then(|mut reply| reply.keys.pop())
                .map(|stream| stream.ids)
                .unwrap_or_default()),
            Err(error) => {
                self.con = None;
                Err(error.into())
            }
        }
    }

    fn entry(&self, entry: StreamId) -> Result<RedisQueueEntry<F>, (String, RedisQueueError)> {
        let id = entry.id.clone();

        RedisQueueEntry::new(
            self.factory.clone(),
            entry,
            self.key.clone(),
            self.group.identifier().to_owned(),
        )
        .map_err(|e| (id, e))
    }
}

#[async_trait]
impl<F> QueueSubscription for RedisQueueSubscription<F>
where
    F: RedisFactory + Clone + Send + Sync + 'static,
{
    type Entry = RedisQueueEntry<F>;

    async fn next_before(&mut self, deadline: Instant) -> Result<Option<Self::Entry>, BoxedError> {
        loop {
            while let Some(raw) = self.buffer.pop_front() {
                match self.entry(raw) {
                    Ok(entry) => return Ok(Some(entry)),
                    Err((id, error)) => {
                        warn!(%error, %id, "Discarding malformed stream entry");
                        discard_entry(&self.factory, &self.key, self.group.identifier(), &id).await;
                    }
                }
            }

            // A block duration of zero would wait forever
            let remaining = deadline.saturating_duration_since(Instant::now());
            let block: usize = remaining.as_millis().try_into().unwrap_or(usize::MAX);
            if block == 0 {
                return Ok(None);
            }

            let ids = self.read(block).await?;

            if self.cursor == STREAM_ID_ADDITIONS {
                if ids.is_empty() {
                    return Ok(None);
                }
            } else if let Some(last) = ids.last() {
                self.cursor = last.id.clone();
            } else {
                trace!(key = %self.key, "Pending entries processed, switching to new entries");
                self.cursor = STREAM_ID_ADDITIONS.to_owned();
            }

            self.buffer.extend(ids);
        }
    }

    /// Only marks the subscription as closed once the group is gone, so an abandoned
    /// or failed close is retried by the drop handler
    async fn close(mut self) -> EmptyResult {
        if self.group.is_ephemeral() {
            destroy_consumer_group(&self.factory, &self.key, self.group.identifier()).await?;
        }

        self.closed = true;
        Ok(())
    }
}

impl<F> Drop for RedisQueueSubscription<F>
where
    F: RedisFactory + Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if self.closed || !self.group.is_ephemeral() {
            return;
        }

        if let Ok(handle) = Handle::try_current() {
            let factory = self.factory.clone();
            let key = self.key.clone();
            let group = self.group.identifier().to_owned();

            handle.spawn(async move {
                if let Err(error) = destroy_consumer_group(&factory, &key, &group).await {
                    warn!(%error, %group, "Failed to release abandoned consumer group");
                }
            });
        }
    }
}

async fn create_consumer_group<C: ConnectionLike + Send>(
    con: &mut C,
    key: &str,
    group: &ConsumerGroupDescriptor,
) {
    let start_id = match group.start() {
        QueueLocation::Head => STREAM_ID_HEAD,
        QueueLocation::Tail => STREAM_ID_TAIL,
    };

    // Fails with BUSYGROUP if the group exists already, which is fine
    con.xgroup_create_mkstream::<_, _, _, ()>(key, group.identifier(), start_id)
        .await
        .ok();
}

async fn destroy_consumer_group<F: RedisFactory>(
    factory: &F,
    key: &str,
    group: &str,
) -> EmptyResult {
    let mut con = factory.multiplexed().await?;
    con.xgroup_destroy::<_, _, ()>(key, group).await?;
    trace!(key, group, "Released consumer group");
    Ok(())
}

async fn discard_entry<F: RedisFactory>(factory: &F, key: &str, group: &str, id: &str) {
    let acknowledgement = async {
        let mut con = factory.multiplexed().await?;
        con.xack::<_, _, _, ()>(key, group, &[id]).await?;
        Ok::<(), BoxedError>(())
    };

    if let Err(error) = acknowledgement.await {
        warn!(%error, id, "Failed to acknowledge malformed entry");
    }
}
