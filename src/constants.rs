//! Default values shared across modules

/// Queue carrying user requests
pub const QUEUE_USER_REQUESTS: &str = "user-requests";
/// Queue carrying responses to user requests
pub const QUEUE_USER_RESPONSES: &str = "user-responses";
/// Queue carrying health probes
pub const QUEUE_SERVICE_PING: &str = "service-ping";
/// Queue carrying replies to health probes
pub const QUEUE_SERVICE_PONG: &str = "service-pong";
/// Approximate number of messages retained per queue
pub const QUEUE_LIMIT: usize = 10_000;

/// Identifier of the gateway service
pub const SERVICE_GATEWAY: &str = "api-gateway";
/// Identifier of the user service
pub const SERVICE_USERS: &str = "user-service";
