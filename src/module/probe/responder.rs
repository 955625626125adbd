use super::HealthCheck;
use crate::domain::{ProbeEnvelope, ProbeReply, ServiceIdentifier};
use crate::library::communication::event::{Consumer, Publisher, QueueDescriptor, QueueEntry};
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use tracing::{debug, instrument, trace};

/// Consumer replying to probes addressed to a single service
pub struct ProbeResponder<P, H> {
    service: ServiceIdentifier,
    health: H,
    publisher: P,
    pong: QueueDescriptor,
}

impl<P, H> ProbeResponder<P, H>
where
    P: Publisher,
    H: HealthCheck,
{
    /// Creates a new responder which publishes replies as `service` to the `pong` queue
    pub fn new(service: ServiceIdentifier, health: H, publisher: P, pong: QueueDescriptor) -> Self {
        Self {
            service,
            health,
            publisher,
            pong,
        }
    }
}

#[async_trait]
impl<P, H> Consumer for ProbeResponder<P, H>
where
    P: Publisher + Send + Sync,
    H: HealthCheck + Send + Sync,
{
    type Message = ProbeEnvelope;

    fn decode<E: QueueEntry>(&self, entry: &E) -> Result<Self::Message, BoxedError> {
        Ok(ProbeEnvelope::decode(entry.key(), entry.payload())?)
    }

    #[instrument(skip(self, probe), fields(service = %self.service, target = probe.target.key()))]
    async fn consume(&self, probe: Self::Message) -> EmptyResult {
        if !probe.target.addresses(&self.service) {
            trace!("Ignoring probe addressed to another service");
            return Ok(());
        }

        let status = self.health.status().await;
        let reply = ProbeReply::new(self.service.clone(), status);

        self.publisher
            .publish(&self.pong, &self.service, &reply)
            .await?;

        debug!(?status, "Answered probe");
        Ok(())
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::domain::{HealthStatus, ProbeTarget, Topics};
    use crate::library::communication::event::{
        ConsumerGroupDescriptor, QueueLocation, QueueProvider, QueueSubscription, RawPublisher,
        RawQueueEntry,
    };
    use crate::library::communication::implementation::memory::MemoryBus;
    use crate::module::probe::AlwaysHealthy;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Clone)]
    struct Degraded;

    #[async_trait]
    impl HealthCheck for Degraded {
        async fn status(&self) -> HealthStatus {
            HealthStatus::Unhealthy
        }
    }

    fn responder<H: HealthCheck>(bus: &MemoryBus, health: H) -> ProbeResponder<MemoryBus, H> {
        ProbeResponder::new("user-service".into(), health, bus.clone(), Topics::default().pong)
    }

    async fn replies(bus: &MemoryBus) -> Vec<ProbeReply> {
        let group = ConsumerGroupDescriptor::durable("inspector", QueueLocation::Head);
        let pong = Topics::default().pong;
        let mut subscription = bus.subscribe(&pong, &group, "inspector").await.unwrap();
        let deadline = Instant::now() + Duration::from_millis(50);
        let mut replies = Vec::new();

        while let Some(entry) = subscription.next_before(deadline).await.unwrap() {
            assert_eq!(entry.key(), "user-service");
            replies.push(entry.parse_payload().unwrap());
        }

        replies
    }

    #[tokio::test]
    async fn answer_probes_addressed_to_the_service() {
        let bus = MemoryBus::default();
        let responder = responder(&bus, AlwaysHealthy);

        let probe = ProbeEnvelope::new(ProbeTarget::Service("user-service".into()));
        responder.consume(probe).await.unwrap();

        let replies = replies(&bus).await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].sender, "user-service");
        assert_eq!(replies[0].status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn answer_broadcasts_with_the_current_health() {
        let bus = MemoryBus::default();
        let responder = responder(&bus, Degraded);

        responder
            .consume(ProbeEnvelope::new(ProbeTarget::Broadcast))
            .await
            .unwrap();

        let replies = replies(&bus).await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn ignore_probes_for_other_services() {
        let bus = MemoryBus::default();
        let responder = responder(&bus, AlwaysHealthy);

        let probe = ProbeEnvelope::new(ProbeTarget::Service("catalog-service".into()));
        responder.consume(probe).await.unwrap();

        assert_eq!(bus.len(&Topics::default().pong), 0);
    }

    #[tokio::test]
    async fn decode_literal_probes_using_the_entry_key() {
        let bus = MemoryBus::default();
        let ping = Topics::default().ping;
        let responder = responder(&bus, AlwaysHealthy);
        bus.publish_raw(&ping, "user-service", b"ping").await.unwrap();

        let group = ConsumerGroupDescriptor::durable("user-service-probe", QueueLocation::Head);
        let mut subscription = bus.subscribe(&ping, &group, "test").await.unwrap();
        let deadline = Instant::now() + Duration::from_secs(1);
        let entry = subscription.next_before(deadline).await.unwrap().unwrap();

        let probe = responder.decode(&entry).unwrap();
        assert_eq!(probe.target, ProbeTarget::Service("user-service".into()));
    }
}
