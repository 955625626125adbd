use crate::library::communication::request::{
    generate_correlation_id, Correlated, CorrelationId, Request,
};
use crate::library::BoxedError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Operation requested from the user service
///
/// Unrecognized names are retained as [`Action::Unknown`] so that envelopes
/// carrying them can still be decoded and deliberately ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    /// Create a new account
    Register,
    /// Exchange credentials for a session
    Login,
    /// Fetch the account behind a session
    GetProfile,
    /// Terminate a session
    Logout,
    /// Action without known semantics
    Unknown(String),
}

impl Action {
    /// Name of the action on the wire
    pub fn as_str(&self) -> &str {
        match self {
            Action::Register => "register",
            Action::Login => "login",
            Action::GetProfile => "get_profile",
            Action::Logout => "logout",
            Action::Unknown(name) => name,
        }
    }
}

impl From<String> for Action {
    fn from(name: String) -> Self {
        match name.as_str() {
            "register" => Action::Register,
            "login" => Action::Login,
            "get_profile" => Action::GetProfile,
            "logout" => Action::Logout,
            _ => Action::Unknown(name),
        }
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.as_str().to_owned()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request for the user service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Identifier the response will carry
    pub correlation_id: CorrelationId,
    /// Requested operation
    pub action: Action,
    /// Action specific parameters
    #[serde(rename = "data", default)]
    pub payload: Value,
    /// Point in time the request has been created
    #[serde(rename = "timestamp")]
    pub issued_at: DateTime<Utc>,
}

impl RequestEnvelope {
    /// Creates a new request with a fresh correlation id
    pub fn new(action: Action, payload: Value) -> Self {
        Self {
            correlation_id: generate_correlation_id(),
            action,
            payload,
            issued_at: Utc::now(),
        }
    }
}

impl Correlated for RequestEnvelope {
    fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

impl Request for RequestEnvelope {
    type Response = ResponseEnvelope;

    fn failure_response(correlation_id: CorrelationId, _error: &BoxedError) -> Option<Self::Response> {
        Some(ResponseEnvelope::failure(
            correlation_id,
            500,
            "internal server error",
        ))
    }
}

/// Outcome of a [`RequestEnvelope`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Identifier of the request this responds to
    pub correlation_id: CorrelationId,
    /// HTTP style status, `2xx` on success, `4xx` for rejected requests and `5xx` for failures
    pub status_code: u16,
    /// Result of a successful operation or an object with an `error` field
    #[serde(rename = "data", default)]
    pub payload: Value,
    /// Human readable description of what went wrong
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    /// Creates a response for a successful operation
    pub fn success(correlation_id: CorrelationId, status_code: u16, payload: Value) -> Self {
        Self {
            correlation_id,
            status_code,
            payload,
            error: None,
        }
    }

    /// Creates a response for a failed operation
    pub fn failure(correlation_id: CorrelationId, status_code: u16, message: &str) -> Self {
        Self {
            correlation_id,
            status_code,
            payload: json!({ "error": message }),
            error: Some(message.to_owned()),
        }
    }

    /// Whether the status indicates success
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

impl Correlated for ResponseEnvelope {
    fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}
