//! Serialization and deserialization provided by [`serde_json`] using marker traits
//!
//! This module allows implementors of traits that allow raw access to underlying messaging systems
//! to provide the higher-level traits relying on serialization. It does so by providing a number of
//! marker traits which, when implemented, provide default implementations of the higher-level traits
//! by translating between lower-level serialized data and higher-level strongly typed data by using
//! [`serde_json`].

use super::super::event::{Publisher, QueueDescriptor, QueueEntry, RawPublisher, RawQueueEntry};
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Marker trait providing a default [`Publisher`] implementation based on [`serde_json`]
pub trait JsonPublisher: RawPublisher + Send + Sync {}

#[async_trait]
impl<P> Publisher for P
where
    P: JsonPublisher,
{
    /// Serializes the message using [`serde_json::to_vec`]
    async fn publish<M: Serialize + Send + Sync>(
        &self,
        queue: &QueueDescriptor,
        key: &str,
        message: &M,
    ) -> EmptyResult {
        let data = serde_json::to_vec(message)?;
        self.publish_raw(queue, key, &data).await
    }
}

/// Marker trait providing a default [`QueueEntry`] implementation based on [`serde_json`]
pub trait JsonQueueEntry: RawQueueEntry {}

impl<E> QueueEntry for E
where
    E: JsonQueueEntry,
{
    /// Parses the payload using [`serde_json::from_slice`]
    fn parse_payload<'a, T>(&'a self) -> Result<T, BoxedError>
    where
        T: Deserialize<'a>,
    {
        serde_json::from_slice(self.payload()).map_err(Into::into)
    }
}
