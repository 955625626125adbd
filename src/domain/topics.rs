use crate::constants::{
    QUEUE_LIMIT, QUEUE_SERVICE_PING, QUEUE_SERVICE_PONG, QUEUE_USER_REQUESTS,
    QUEUE_USER_RESPONSES,
};
use crate::library::communication::event::QueueDescriptor;

/// Queues the services communicate through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    /// Carries [`RequestEnvelopes`](super::RequestEnvelope), keyed by correlation id
    pub requests: QueueDescriptor,
    /// Carries [`ResponseEnvelopes`](super::ResponseEnvelope), keyed by correlation id
    pub responses: QueueDescriptor,
    /// Carries [`ProbeEnvelopes`](super::ProbeEnvelope), keyed by target
    pub ping: QueueDescriptor,
    /// Carries [`ProbeReplies`](super::ProbeReply), keyed by sender
    pub pong: QueueDescriptor,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            requests: QueueDescriptor::new(QUEUE_USER_REQUESTS.into(), QUEUE_LIMIT),
            responses: QueueDescriptor::new(QUEUE_USER_RESPONSES.into(), QUEUE_LIMIT),
            ping: QueueDescriptor::new(QUEUE_SERVICE_PING.into(), QUEUE_LIMIT),
            pong: QueueDescriptor::new(QUEUE_SERVICE_PONG.into(), QUEUE_LIMIT),
        }
    }
}
