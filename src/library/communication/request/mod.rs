//! Structures to send requests and await their responses over message queues
//!
//! Requests and responses are plain messages linked by a correlation id. A requesting service
//! first starts listening on the response queue with a consumer group of its own, publishes
//! the request and then reads responses until one carries its correlation id or the deadline
//! passes. Unrelated responses are acknowledged and dropped, so they never pile up in the group.
//!
//! On the other end, a [`Responder`] consumes the request queue, hands each request to a
//! [`RequestProcessor`] and publishes the returned response keyed by the correlation id.

mod request;
mod requestor;
mod responder;
mod tracker;

pub use request::*;
pub use requestor::*;
pub use responder::*;
pub use tracker::*;
