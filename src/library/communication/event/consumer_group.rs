use super::QueueLocation;
use uuid::Uuid;

/// Lifetime of a consumer group on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupLifetime {
    /// Outlives its subscriptions, later subscriptions resume from the last position
    Durable,
    /// Removed from the bus when its subscription is closed
    Ephemeral,
}

/// Definition of a consumer group
///
/// In a message queue, a group of consumers collaborates to consume messages.
/// Each message is only delivered to one consumer within the same group.
/// When it is created, the group starts processing messages from the provided [`QueueLocation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerGroupDescriptor {
    identifier: String,
    start: QueueLocation,
    lifetime: GroupLifetime,
}

impl ConsumerGroupDescriptor {
    /// Creates a group that persists across subscriptions
    pub fn durable(identifier: impl Into<String>, start: QueueLocation) -> Self {
        Self {
            identifier: identifier.into(),
            start,
            lifetime: GroupLifetime::Durable,
        }
    }

    /// Creates a uniquely named group which only sees messages published after it has been created
    pub fn ephemeral(prefix: &str) -> Self {
        Self {
            identifier: format!("{}-{}", prefix, Uuid::new_v4()),
            start: QueueLocation::Tail,
            lifetime: GroupLifetime::Ephemeral,
        }
    }

    /// Unique identifier of the group
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Location from where a consumer group begins to consume messages
    ///
    /// Note that this is only honored when the group is created, existing groups resume where they left off!
    pub fn start(&self) -> QueueLocation {
        self.start
    }

    /// Whether the group is removed once its subscription closes
    pub fn is_ephemeral(&self) -> bool {
        self.lifetime == GroupLifetime::Ephemeral
    }
}

/// Unique identifier of a consumer within a [`ConsumerGroup`](ConsumerGroupDescriptor)
pub type ConsumerIdentifier = String;

#[cfg(test)]
mod does {
    use super::*;

    #[test]
    fn generate_unique_ephemeral_groups() {
        let first = ConsumerGroupDescriptor::ephemeral("gateway");
        let second = ConsumerGroupDescriptor::ephemeral("gateway");

        assert_ne!(first.identifier(), second.identifier());
        assert!(first.identifier().starts_with("gateway-"));
        assert!(first.is_ephemeral());
        assert_eq!(first.start(), QueueLocation::Tail);
    }

    #[test]
    fn keep_durable_group_names() {
        let group = ConsumerGroupDescriptor::durable("user-service", QueueLocation::Head);

        assert_eq!(group.identifier(), "user-service");
        assert!(!group.is_ephemeral());
    }
}
