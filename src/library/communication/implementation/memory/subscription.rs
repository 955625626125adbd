use super::{MemoryBus, MemoryQueueEntry};
use crate::library::communication::event::{ConsumerGroupDescriptor, QueueSubscription};
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use tokio::time::{timeout_at, Instant};

/// Membership of a consumer in a group of the [`MemoryBus`]
pub struct MemorySubscription {
    bus: MemoryBus,
    queue: String,
    group: String,
    consumer: String,
    ephemeral: bool,
    replay: Option<u64>,
    released: bool,
}

impl MemorySubscription {
    pub(super) fn new(
        bus: MemoryBus,
        queue: String,
        group: &ConsumerGroupDescriptor,
        consumer: String,
    ) -> Self {
        Self {
            bus,
            queue,
            group: group.identifier().to_owned(),
            consumer,
            ephemeral: group.is_ephemeral(),
            replay: Some(0),
            released: false,
        }
    }

    fn release(&mut self) {
        if self.ephemeral && !self.released {
            self.bus.release(&self.queue, &self.group);
            self.released = true;
        }
    }
}

#[async_trait]
impl QueueSubscription for MemorySubscription {
    type Entry = MemoryQueueEntry;

    async fn next_before(&mut self, deadline: Instant) -> Result<Option<Self::Entry>, BoxedError> {
        let shared = self.bus.shared.clone();

        loop {
            // Registered before looking at the queue so no publication can slip through in between
            let notified = shared.notify.notified();

            self.bus.check_availability()?;

            if let Some(entry) =
                self.bus
                    .claim(&self.queue, &self.group, &self.consumer, &mut self.replay)?
            {
                return Ok(Some(entry));
            }

            if timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn close(mut self) -> EmptyResult {
        self.release();
        Ok(())
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        self.release();
    }
}
