use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of a service taking part in health reporting
pub type ServiceIdentifier = String;

/// Body of every probe, also accepted as a raw payload on its own
pub const PROBE_MARKER: &str = "ping";

const BROADCAST_TARGET: &str = "*";

/// Set of services a probe is meant for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProbeTarget {
    /// Every service listening
    Broadcast,
    /// One specific service
    Service(ServiceIdentifier),
}

impl ProbeTarget {
    /// Whether a service with the given identifier should reply
    pub fn addresses(&self, service: &str) -> bool {
        match self {
            ProbeTarget::Broadcast => true,
            ProbeTarget::Service(target) => target == service,
        }
    }

    /// Message key to publish the probe with, empty for broadcasts
    pub fn key(&self) -> &str {
        match self {
            ProbeTarget::Broadcast => "",
            ProbeTarget::Service(target) => target,
        }
    }
}

impl From<String> for ProbeTarget {
    fn from(target: String) -> Self {
        if target.is_empty() || target == BROADCAST_TARGET {
            ProbeTarget::Broadcast
        } else {
            ProbeTarget::Service(target)
        }
    }
}

impl From<ProbeTarget> for String {
    fn from(target: ProbeTarget) -> Self {
        match target {
            ProbeTarget::Broadcast => BROADCAST_TARGET.to_owned(),
            ProbeTarget::Service(target) => target,
        }
    }
}

/// Error raised when a probe can not be decoded
#[derive(Debug, Error)]
pub enum ProbeDecodeError {
    /// Payload is neither a structured probe nor the literal marker
    #[error("probe payload is malformed")]
    Malformed(#[source] serde_json::Error),
}

/// Liveness check sent to one or all services
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeEnvelope {
    /// Who should reply
    pub target: ProbeTarget,
    /// Always [`PROBE_MARKER`]
    pub body: String,
}

impl ProbeEnvelope {
    /// Creates a probe for the given target
    pub fn new(target: ProbeTarget) -> Self {
        Self {
            target,
            body: PROBE_MARKER.to_owned(),
        }
    }

    /// Decodes a probe from a queue entry.
    ///
    /// Besides structured probes, the literal marker is accepted as payload in which case
    /// the message key names the target.
    pub fn decode(key: &str, payload: &[u8]) -> Result<Self, ProbeDecodeError> {
        if payload == PROBE_MARKER.as_bytes() {
            return Ok(Self::new(ProbeTarget::from(key.to_owned())));
        }

        serde_json::from_slice(payload).map_err(ProbeDecodeError::Malformed)
    }
}

/// Health of a service as reported by itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Operating normally
    Healthy,
    /// Running but impaired
    Unhealthy,
}

/// Reply to a [`ProbeEnvelope`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeReply {
    /// Service sending the reply
    #[serde(rename = "service")]
    pub sender: ServiceIdentifier,
    /// Reported health
    pub status: HealthStatus,
    /// Point in time the health has been determined
    #[serde(rename = "timestamp")]
    pub observed_at: DateTime<Utc>,
}

impl ProbeReply {
    /// Creates a reply observed right now
    pub fn new(sender: ServiceIdentifier, status: HealthStatus) -> Self {
        Self {
            sender,
            status,
            observed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn accept_the_literal_marker() {
        let addressed = ProbeEnvelope::decode("user-service", b"ping").unwrap();
        let broadcast = ProbeEnvelope::decode("", b"ping").unwrap();

        assert!(addressed.target.addresses("user-service"));
        assert!(!addressed.target.addresses("catalog-service"));
        assert_eq!(broadcast.target, ProbeTarget::Broadcast);
    }

    #[test]
    fn accept_structured_probes() {
        let probe = ProbeEnvelope::new(ProbeTarget::Service("catalog-service".into()));
        let payload = serde_json::to_vec(&probe).unwrap();

        assert_eq!(
            ProbeEnvelope::decode("catalog-service", &payload).unwrap(),
            probe
        );
        assert!(ProbeEnvelope::decode("", b"pong").is_err());
    }

    #[test]
    fn serialize_replies_with_wire_names() {
        let reply = ProbeReply::new("user-service".into(), HealthStatus::Healthy);
        let value = serde_json::to_value(&reply).unwrap();

        assert_eq!(value["service"], "user-service");
        assert_eq!(value["status"], "healthy");
        assert!(value["timestamp"].is_string());
    }
}
