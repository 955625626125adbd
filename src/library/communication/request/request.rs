use crate::library::BoxedError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// Opaque token linking a request to its response
pub type CorrelationId = String;

/// Creates a new, globally unique correlation id
pub fn generate_correlation_id() -> CorrelationId {
    Uuid::new_v4().to_string()
}

/// Message which carries a correlation id
pub trait Correlated {
    /// Identifier shared by a request and all of its responses
    fn correlation_id(&self) -> &str;
}

/// Message which can be replied to
///
/// Requests are delivered at-least-once. Processing the same request
/// twice must thus yield the same outcome, and the requestor has to
/// tolerate receiving more than one response.
pub trait Request: Serialize + Correlated {
    /// Expected response type
    type Response: Serialize + DeserializeOwned + Correlated + Send + Sync;

    /// Response to send when processing the request failed unexpectedly.
    ///
    /// Returning `None` means no response will be sent and the requestor will time out.
    fn failure_response(
        _correlation_id: CorrelationId,
        _error: &BoxedError,
    ) -> Option<Self::Response> {
        None
    }
}
