use crate::domain::{Action, RequestEnvelope, ResponseEnvelope};
use crate::library::communication::request::{RequestError, Requestor};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Result of forwarding a request to the user service
#[derive(Debug, PartialEq)]
pub enum DispatchOutcome {
    /// The service answered, possibly refusing the request
    Responded(ResponseEnvelope),
    /// No answer arrived in time
    TimedOut,
    /// The bus could not be used to send the request or listen for its answer
    Unavailable,
}

/// Forwards actions to the user service and waits for their outcome
pub struct UserGateway<R> {
    requestor: R,
}

impl<R> UserGateway<R>
where
    R: Requestor + Send + Sync,
{
    /// Creates a new gateway sending its requests through the given requestor
    pub fn new(requestor: R) -> Self {
        Self { requestor }
    }

    /// Wraps the payload in a fresh envelope and waits at most `timeout` for its response
    #[instrument(skip(self, payload, timeout))]
    pub async fn dispatch(&self, action: Action, payload: Value, timeout: Duration) -> DispatchOutcome {
        let envelope = RequestEnvelope::new(action, payload);

        match self.requestor.request(&envelope, timeout).await {
            Ok(response) => DispatchOutcome::Responded(response),
            Err(RequestError::Timeout(timeout)) => {
                info!(correlation_id = %envelope.correlation_id, ?timeout, "Request timed out");
                DispatchOutcome::TimedOut
            }
            Err(error) => {
                warn!(correlation_id = %envelope.correlation_id, %error, "Unable to dispatch request");
                DispatchOutcome::Unavailable
            }
        }
    }
}
