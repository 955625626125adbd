use super::QueueDescriptor;
use crate::library::EmptyResult;
use async_trait::async_trait;
use serde::Serialize;

/// Publisher for raw messages
#[async_trait]
pub trait RawPublisher {
    /// Appends a raw message with the given key to a queue
    async fn publish_raw(&self, queue: &QueueDescriptor, key: &str, data: &[u8]) -> EmptyResult;
}

/// Publisher for structured messages
#[async_trait]
pub trait Publisher {
    /// Serializes the message and appends it to a queue using the given key
    async fn publish<M: Serialize + Send + Sync>(
        &self,
        queue: &QueueDescriptor,
        key: &str,
        message: &M,
    ) -> EmptyResult;
}
