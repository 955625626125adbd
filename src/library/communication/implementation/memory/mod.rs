//! In-process message bus
//!
//! Provides the same consumer group semantics as the [`redis`](super::redis) implementation
//! without any external dependency. Every group keeps track of the last entry delivered to it
//! and of the entries each consumer has not acknowledged yet. Entries are evicted once a
//! queue grows beyond its [limit](QueueDescriptor::limit).

mod entry;
mod subscription;

pub use entry::MemoryQueueEntry;
pub use subscription::MemorySubscription;

use super::json::JsonPublisher;
use crate::library::communication::event::{
    ConsumerGroupDescriptor, QueueDescriptor, QueueLocation, QueueProvider, RawPublisher,
};
use crate::library::communication::CommunicationFactory;
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::Notify;

/// Errors raised by the [`MemoryBus`]
#[derive(Debug, Error)]
pub enum MemoryBusError {
    /// An outage has been simulated using [`MemoryBus::set_outage`]
    #[error("message bus is unavailable")]
    Unavailable,
    /// The consumer group has been removed while a subscription was still active
    #[error("consumer group {0} does not exist")]
    UnknownGroup(String),
}

/// Message bus living in the memory of the current process
///
/// Cloning the bus yields another handle to the same queues.
#[derive(Clone, Default)]
pub struct MemoryBus {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<BusState>,
    outage: AtomicBool,
    notify: Notify,
}

#[derive(Default)]
struct BusState {
    queues: HashMap<String, Queue>,
}

#[derive(Default)]
struct Queue {
    last_id: u64,
    entries: VecDeque<StoredEntry>,
    groups: HashMap<String, GroupState>,
}

struct StoredEntry {
    id: u64,
    key: String,
    payload: Vec<u8>,
}

struct GroupState {
    last_delivered: u64,
    pending: BTreeMap<u64, String>,
}

impl MemoryBus {
    /// Simulates the bus becoming unreachable, all operations fail while the outage lasts
    pub fn set_outage(&self, outage: bool) {
        self.shared.outage.store(outage, Ordering::SeqCst);
        self.shared.notify.notify_waiters();
    }

    /// Number of entries currently retained in the queue
    pub fn len(&self, queue: &QueueDescriptor) -> usize {
        self.state()
            .queues
            .get(queue.key())
            .map(|q| q.entries.len())
            .unwrap_or_default()
    }

    /// Number of consumer groups registered on the queue
    pub fn group_count(&self, queue: &QueueDescriptor) -> usize {
        self.state()
            .queues
            .get(queue.key())
            .map(|q| q.groups.len())
            .unwrap_or_default()
    }

    /// Number of entries delivered to the group which have not been acknowledged yet
    pub fn pending_count(&self, queue: &QueueDescriptor, group: &str) -> usize {
        self.state()
            .queues
            .get(queue.key())
            .and_then(|q| q.groups.get(group))
            .map(|g| g.pending.len())
            .unwrap_or_default()
    }

    fn state(&self) -> MutexGuard<'_, BusState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn check_availability(&self) -> Result<(), MemoryBusError> {
        if self.shared.outage.load(Ordering::SeqCst) {
            Err(MemoryBusError::Unavailable)
        } else {
            Ok(())
        }
    }

    fn append(&self, queue: &QueueDescriptor, key: &str, payload: &[u8]) -> Result<(), MemoryBusError> {
        self.check_availability()?;

        {
            let mut state = self.state();
            let entry = state.queues.entry(queue.key().to_owned()).or_default();

            entry.last_id += 1;
            entry.entries.push_back(StoredEntry {
                id: entry.last_id,
                key: key.to_owned(),
                payload: payload.to_vec(),
            });

            if entry.entries.len() > queue.limit() {
                while entry.entries.len() > queue.limit() {
                    entry.entries.pop_front();
                }

                // Evicted entries can neither be claimed nor acknowledged anymore
                let oldest = entry.entries.front().map_or(entry.last_id + 1, |e| e.id);
                for group in entry.groups.values_mut() {
                    group.pending = group.pending.split_off(&oldest);
                }
            }
        }

        self.shared.notify.notify_waiters();
        Ok(())
    }

    fn join(&self, queue: &QueueDescriptor, group: &ConsumerGroupDescriptor) {
        let mut state = self.state();
        let entry = state.queues.entry(queue.key().to_owned()).or_default();
        let last_delivered = match group.start() {
            QueueLocation::Head => 0,
            QueueLocation::Tail => entry.last_id,
        };

        entry
            .groups
            .entry(group.identifier().to_owned())
            .or_insert_with(|| GroupState {
                last_delivered,
                pending: BTreeMap::new(),
            });
    }

    /// Hands out the next entry for a consumer, replaying its pending entries first while `replay` is set
    fn claim(
        &self,
        queue: &str,
        group: &str,
        consumer: &str,
        replay: &mut Option<u64>,
    ) -> Result<Option<MemoryQueueEntry>, MemoryBusError> {
        let mut state = self.state();
        let unknown_group = || MemoryBusError::UnknownGroup(group.to_owned());
        let Queue {
            entries, groups, ..
        } = state.queues.get_mut(queue).ok_or_else(unknown_group)?;
        let group_state = groups.get_mut(group).ok_or_else(unknown_group)?;

        if let Some(after) = *replay {
            let pending = group_state
                .pending
                .range(after + 1..)
                .filter(|(_, owner)| owner.as_str() == consumer)
                .find_map(|(id, _)| entries.iter().find(|e| e.id == *id));

            match pending {
                Some(stored) => {
                    *replay = Some(stored.id);
                    return Ok(Some(self.entry(queue, group, stored)));
                }
                None => *replay = None,
            }
        }

        match entries.iter().find(|e| e.id > group_state.last_delivered) {
            Some(stored) => {
                group_state.last_delivered = stored.id;
                group_state.pending.insert(stored.id, consumer.to_owned());
                Ok(Some(self.entry(queue, group, stored)))
            }
            None => Ok(None),
        }
    }

    fn entry(&self, queue: &str, group: &str, stored: &StoredEntry) -> MemoryQueueEntry {
        MemoryQueueEntry::new(
            self.clone(),
            queue.to_owned(),
            group.to_owned(),
            stored.id,
            stored.key.clone(),
            stored.payload.clone(),
        )
    }

    fn acknowledge(&self, queue: &str, group: &str, id: u64) -> Result<(), MemoryBusError> {
        self.check_availability()?;

        if let Some(group) = self
            .state()
            .queues
            .get_mut(queue)
            .and_then(|q| q.groups.get_mut(group))
        {
            group.pending.remove(&id);
        }

        Ok(())
    }

    fn release(&self, queue: &str, group: &str) {
        if let Some(queue) = self.state().queues.get_mut(queue) {
            queue.groups.remove(group);
        }
    }
}

#[async_trait]
impl RawPublisher for MemoryBus {
    async fn publish_raw(&self, queue: &QueueDescriptor, key: &str, data: &[u8]) -> EmptyResult {
        self.append(queue, key, data)?;
        Ok(())
    }
}

impl JsonPublisher for MemoryBus {}

#[async_trait]
impl QueueProvider for MemoryBus {
    type Entry = MemoryQueueEntry;
    type Subscription = MemorySubscription;

    async fn subscribe(
        &self,
        queue: &QueueDescriptor,
        group: &ConsumerGroupDescriptor,
        consumer: &str,
    ) -> Result<Self::Subscription, BoxedError> {
        self.check_availability()?;
        self.join(queue, group);

        Ok(MemorySubscription::new(
            self.clone(),
            queue.key().to_owned(),
            group,
            consumer.to_owned(),
        ))
    }
}

impl CommunicationFactory for MemoryBus {
    type QueueProvider = MemoryBus;
    type Publisher = MemoryBus;

    fn queue_provider(&self) -> Self::QueueProvider {
        self.clone()
    }

    fn publisher(&self) -> Self::Publisher {
        self.clone()
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::library::communication::event::{QueueSubscription, RawQueueEntry};
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::time::Instant;

    fn queue() -> QueueDescriptor {
        QueueDescriptor::new("test".into(), 100)
    }

    fn soon() -> Instant {
        Instant::now() + Duration::from_millis(50)
    }

    async fn read_key(subscription: &mut MemorySubscription) -> Option<String> {
        subscription
            .next_before(soon())
            .await
            .unwrap()
            .map(|entry| entry.key().to_owned())
    }

    #[tokio::test]
    async fn deliver_only_new_entries_to_tail_groups() {
        let bus = MemoryBus::default();
        bus.publish_raw(&queue(), "old", b"").await.unwrap();

        let group = ConsumerGroupDescriptor::durable("tail", QueueLocation::Tail);
        let mut subscription = bus.subscribe(&queue(), &group, "c").await.unwrap();
        bus.publish_raw(&queue(), "new", b"").await.unwrap();

        assert_eq!(read_key(&mut subscription).await, Some("new".into()));
        assert_eq!(read_key(&mut subscription).await, None);
    }

    #[tokio::test]
    async fn deliver_retained_entries_to_head_groups() {
        let bus = MemoryBus::default();
        bus.publish_raw(&queue(), "first", b"").await.unwrap();
        bus.publish_raw(&queue(), "second", b"").await.unwrap();

        let group = ConsumerGroupDescriptor::durable("head", QueueLocation::Head);
        let mut subscription = bus.subscribe(&queue(), &group, "c").await.unwrap();

        assert_eq!(read_key(&mut subscription).await, Some("first".into()));
        assert_eq!(read_key(&mut subscription).await, Some("second".into()));
    }

    #[tokio::test]
    async fn resume_durable_groups_from_their_last_position() {
        let bus = MemoryBus::default();
        let group = ConsumerGroupDescriptor::durable("workers", QueueLocation::Tail);

        let mut subscription = bus.subscribe(&queue(), &group, "c").await.unwrap();
        bus.publish_raw(&queue(), "one", b"").await.unwrap();
        let mut entry = subscription.next_before(soon()).await.unwrap().unwrap();
        entry.acknowledge().await.unwrap();
        subscription.close().await.unwrap();

        bus.publish_raw(&queue(), "two", b"").await.unwrap();

        // A tail position is ignored as the group already exists
        let mut subscription = bus.subscribe(&queue(), &group, "c").await.unwrap();
        assert_eq!(read_key(&mut subscription).await, Some("two".into()));
        assert_eq!(bus.group_count(&queue()), 1);
    }

    #[tokio::test]
    async fn redeliver_unacknowledged_entries_to_the_same_consumer() {
        let bus = MemoryBus::default();
        let group = ConsumerGroupDescriptor::durable("workers", QueueLocation::Head);
        bus.publish_raw(&queue(), "crashed", b"").await.unwrap();

        let mut subscription = bus.subscribe(&queue(), &group, "c").await.unwrap();
        assert_eq!(read_key(&mut subscription).await, Some("crashed".into()));
        drop(subscription);

        let mut other = bus.subscribe(&queue(), &group, "other").await.unwrap();
        assert_eq!(read_key(&mut other).await, None);

        let mut subscription = bus.subscribe(&queue(), &group, "c").await.unwrap();
        assert_eq!(read_key(&mut subscription).await, Some("crashed".into()));
        assert_eq!(bus.pending_count(&queue(), "workers"), 1);
    }

    #[tokio::test]
    async fn split_entries_between_consumers_of_a_group() {
        let bus = MemoryBus::default();
        let group = ConsumerGroupDescriptor::durable("workers", QueueLocation::Head);
        bus.publish_raw(&queue(), "a", b"").await.unwrap();
        bus.publish_raw(&queue(), "b", b"").await.unwrap();

        let mut first = bus.subscribe(&queue(), &group, "first").await.unwrap();
        let mut second = bus.subscribe(&queue(), &group, "second").await.unwrap();

        assert_eq!(read_key(&mut first).await, Some("a".into()));
        assert_eq!(read_key(&mut second).await, Some("b".into()));
        assert_eq!(read_key(&mut first).await, None);
    }

    #[tokio::test]
    async fn release_ephemeral_groups() {
        let bus = MemoryBus::default();

        let closed = bus
            .subscribe(&queue(), &ConsumerGroupDescriptor::ephemeral("closed"), "c")
            .await
            .unwrap();
        let dropped = bus
            .subscribe(&queue(), &ConsumerGroupDescriptor::ephemeral("dropped"), "c")
            .await
            .unwrap();
        assert_eq!(bus.group_count(&queue()), 2);

        closed.close().await.unwrap();
        assert_eq!(bus.group_count(&queue()), 1);

        drop(dropped);
        assert_eq!(bus.group_count(&queue()), 0);
    }

    #[tokio::test]
    async fn wake_up_waiting_readers() {
        let bus = MemoryBus::default();
        let group = ConsumerGroupDescriptor::durable("workers", QueueLocation::Tail);
        let mut subscription = bus.subscribe(&queue(), &group, "c").await.unwrap();

        let publisher = bus.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            publisher.publish_raw(&queue(), "late", b"").await.unwrap();
        });

        let deadline = Instant::now() + Duration::from_secs(5);
        let entry = subscription.next_before(deadline).await.unwrap().unwrap();

        assert_eq!(entry.key(), "late");
        assert!(Instant::now() < deadline);
    }

    #[tokio::test]
    async fn fail_during_outages() {
        let bus = MemoryBus::default();
        let group = ConsumerGroupDescriptor::durable("workers", QueueLocation::Head);
        let mut subscription = bus.subscribe(&queue(), &group, "c").await.unwrap();

        bus.set_outage(true);
        assert!(bus.publish_raw(&queue(), "lost", b"").await.is_err());
        assert!(subscription.next_before(soon()).await.is_err());

        bus.set_outage(false);
        bus.publish_raw(&queue(), "delivered", b"").await.unwrap();
        assert_eq!(read_key(&mut subscription).await, Some("delivered".into()));
    }

    #[tokio::test]
    async fn evict_entries_beyond_the_limit() {
        let bus = MemoryBus::default();
        let queue = QueueDescriptor::new("short".into(), 2);

        for key in &["a", "b", "c"] {
            bus.publish_raw(&queue, key, b"").await.unwrap();
        }

        let group = ConsumerGroupDescriptor::durable("workers", QueueLocation::Head);
        let mut subscription = bus.subscribe(&queue, &group, "c").await.unwrap();

        assert_eq!(bus.len(&queue), 2);
        assert_eq!(read_key(&mut subscription).await, Some("b".into()));
    }

    #[tokio::test]
    async fn forget_pending_entries_once_evicted() {
        let bus = MemoryBus::default();
        let queue = QueueDescriptor::new("short".into(), 2);
        let group = ConsumerGroupDescriptor::durable("workers", QueueLocation::Head);
        let mut subscription = bus.subscribe(&queue, &group, "c").await.unwrap();

        bus.publish_raw(&queue, "a", b"").await.unwrap();
        bus.publish_raw(&queue, "b", b"").await.unwrap();
        assert_eq!(read_key(&mut subscription).await, Some("a".into()));
        assert_eq!(read_key(&mut subscription).await, Some("b".into()));
        assert_eq!(bus.pending_count(&queue, "workers"), 2);

        bus.publish_raw(&queue, "c", b"").await.unwrap();
        assert_eq!(bus.pending_count(&queue, "workers"), 1);

        bus.publish_raw(&queue, "d", b"").await.unwrap();
        bus.publish_raw(&queue, "e", b"").await.unwrap();
        assert_eq!(bus.pending_count(&queue, "workers"), 0);
    }
}
