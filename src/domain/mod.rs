//! Data structures exchanged between the services
//!
//! Everything in here describes what travels over the bus: the request and response
//! envelopes of the user service, the probes used for health reporting, the payloads
//! of individual user actions and the set of queues they are sent through.

mod envelope;
mod probe;
mod topics;
mod user;

pub use envelope::*;
pub use probe::*;
pub use topics::*;
pub use user::*;
