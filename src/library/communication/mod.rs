//! Structures to communicate between services over a shared, append-only message bus
//!
//! In general, there are two modes of operation:
//!
//! 1. Publish and consume
//! 2. Request and response
//!
//! The first one is the foundation. Services publish messages to named queues and
//! interested parties consume them using consumer groups which track their reading
//! position independently of each other. Delivery is at-least-once, so every consumer
//! has to be idempotent. For more details, consult the [`event`] module.
//!
//! The second mode of operation builds on top of the first one. A requesting service
//! tags its message with a correlation id, starts listening on a response queue and
//! blocks until a message carrying the same id arrives or a deadline passes. Each waiter
//! reads through a consumer group of its own so that it never competes with other waiters
//! for the same message. This is implemented in the [`request`] module.

mod communication_factory;

pub mod event;
pub mod implementation;
pub mod request;

pub use communication_factory::CommunicationFactory;
