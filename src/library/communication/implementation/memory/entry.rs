use super::super::json::JsonQueueEntry;
use super::MemoryBus;
use crate::library::communication::event::RawQueueEntry;
use crate::library::EmptyResult;
use async_trait::async_trait;

/// Entry handed out by a [`MemorySubscription`](super::MemorySubscription)
pub struct MemoryQueueEntry {
    bus: MemoryBus,
    queue: String,
    group: String,
    id: u64,
    key: String,
    payload: Vec<u8>,
}

impl MemoryQueueEntry {
    pub(super) fn new(
        bus: MemoryBus,
        queue: String,
        group: String,
        id: u64,
        key: String,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            bus,
            queue,
            group,
            id,
            key,
            payload,
        }
    }
}

#[async_trait]
impl RawQueueEntry for MemoryQueueEntry {
    fn key(&self) -> &str {
        &self.key
    }

    fn payload(&self) -> &[u8] {
        &self.payload
    }

    async fn acknowledge(&mut self) -> EmptyResult {
        self.bus.acknowledge(&self.queue, &self.group, self.id)?;
        Ok(())
    }
}

impl JsonQueueEntry for MemoryQueueEntry {}
