//! Structures to publish and consume messages on queues
//!
//! Messages are stored in a log-like data structure of limited length where old elements
//! are evicted. Each message carries a key and a raw payload.
//!
//! When reading from a queue, services join a [`ConsumerGroup`](ConsumerGroupDescriptor).
//! A group tracks its reading position independently of all other groups. Upon creation it
//! starts at the [`QueueLocation`] requested by its descriptor, later subscriptions resume from
//! wherever the group left off. All [`QueueEntries`](QueueEntry) have to be acknowledged once
//! processing concludes; entries that have been delivered but not acknowledged are delivered
//! again when the same [`Consumer`](ConsumerIdentifier) resubscribes.
//!
//! Multiple consumers may share a group. Each entry is then assigned to only one consumer within
//! the group, effectively implementing load balancing. Groups which are only needed for a short
//! time, like those used to wait for a single response, are [ephemeral](GroupLifetime::Ephemeral)
//! and removed from the bus when their subscription is closed.

mod consumer;
mod consumer_group;
mod publisher;
mod queue;
mod queue_provider;

pub use consumer::*;
pub use consumer_group::*;
pub use publisher::*;
pub use queue::*;
pub use queue_provider::*;
