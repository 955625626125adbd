use crate::domain::{ProbeEnvelope, ProbeReply, ProbeTarget, ServiceIdentifier};
use crate::library::communication::event::{
    release, subscribe_before, ConsumerGroupDescriptor, DeadlineExceeded, Publisher,
    QueueDescriptor, QueueEntry, QueueProvider, QueueSubscription, RawQueueEntry,
};
use crate::library::helpers::Backoff;
use crate::library::BoxedError;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, info, instrument, trace, warn};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Error that aborts a probing round
#[derive(Debug, Error)]
pub enum AggregationError {
    /// Unable to start listening for replies
    #[error("unable to subscribe to the reply queue")]
    SubscriptionFailed(#[source] BoxedError),
    /// Publishing the probe for a service failed
    #[error("unable to deliver probe to {0}")]
    ProbeUndeliverable(ServiceIdentifier, #[source] BoxedError),
}

/// Outcome of a single probing round
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    /// Number of services probed
    #[serde(rename = "total_services")]
    pub total: usize,
    /// Number of distinct services that replied
    #[serde(rename = "responding_services")]
    pub responded: usize,
    /// First reply of each responding service, in order of arrival
    #[serde(rename = "services")]
    pub entries: Vec<ProbeReply>,
    /// Whether every probed service replied
    pub complete: bool,
}

/// Probes a set of services and collects their replies
pub struct HealthAggregator<P, Q> {
    publisher: P,
    provider: Q,
    ping: QueueDescriptor,
    pong: QueueDescriptor,
    consumer: String,
    poll_interval: Duration,
}

impl<P, Q> HealthAggregator<P, Q>
where
    P: Publisher + Send + Sync,
    Q: QueueProvider + Send + Sync,
{
    /// Creates a new aggregator sending probes to `ping` and reading replies from `pong`
    pub fn new(
        publisher: P,
        provider: Q,
        ping: QueueDescriptor,
        pong: QueueDescriptor,
        consumer: &str,
    ) -> Self {
        Self {
            publisher,
            provider,
            ping,
            pong,
            consumer: consumer.to_owned(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Upper bound for a single read
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Probes every peer once and waits at most `timeout` for their replies
    ///
    /// Replies from services outside of `peers` are ignored, repeated replies count once.
    /// Running out of time yields an incomplete report.
    #[instrument(skip(self, peers), fields(peers = peers.len()))]
    pub async fn probe_all(
        &self,
        peers: &[ServiceIdentifier],
        timeout: Duration,
    ) -> Result<HealthReport, AggregationError> {
        let deadline = Instant::now() + timeout;
        let expected: HashSet<&str> = peers.iter().map(String::as_str).collect();

        let group = ConsumerGroupDescriptor::ephemeral(&self.consumer);
        let mut subscription =
            subscribe_before(&self.provider, &self.pong, &group, &self.consumer, deadline)
                .await
                .map_err(AggregationError::SubscriptionFailed)?;

        for peer in &expected {
            let probe = ProbeEnvelope::new(ProbeTarget::Service((*peer).to_owned()));
            let delivery = timeout_at(deadline, self.publisher.publish(&self.ping, peer, &probe))
                .await
                .unwrap_or_else(|_| Err(DeadlineExceeded.into()));

            if let Err(error) = delivery {
                warn!(%error, peer, "Unable to deliver probe");
                close(subscription).await;
                return Err(AggregationError::ProbeUndeliverable((*peer).to_owned(), error));
            }
        }

        let entries = self.collect(&mut subscription, &expected, deadline).await;
        close(subscription).await;

        let report = HealthReport {
            total: expected.len(),
            responded: entries.len(),
            complete: entries.len() == expected.len(),
            entries,
        };

        if report.complete {
            debug!("All services replied");
        } else {
            info!(responded = report.responded, total = report.total, "Not all services replied in time");
        }

        Ok(report)
    }

    async fn collect<S: QueueSubscription>(
        &self,
        subscription: &mut S,
        expected: &HashSet<&str>,
        deadline: Instant,
    ) -> Vec<ProbeReply> {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        let mut backoff = Backoff::default().with_ceiling(self.poll_interval);

        while seen.len() < expected.len() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }

            let read_deadline = (now + self.poll_interval).min(deadline);

            let read = match timeout_at(deadline, subscription.next_before(read_deadline)).await {
                Ok(read) => read,
                Err(_) => break,
            };

            match read {
                Ok(Some(mut entry)) => {
                    backoff.reset();

                    let parsed = entry.parse_payload::<ProbeReply>();

                    match timeout_at(deadline, entry.acknowledge()).await {
                        Ok(Err(error)) => debug!(%error, "Failed to acknowledge reply"),
                        Err(_) => debug!("Acknowledging reply did not finish in time"),
                        Ok(Ok(())) => {}
                    }

                    match parsed {
                        Ok(reply) if !expected.contains(reply.sender.as_str()) => {
                            trace!(sender = %reply.sender, "Ignoring reply from unknown service")
                        }
                        Ok(reply) => {
                            if seen.insert(reply.sender.clone()) {
                                entries.push(reply);
                            } else {
                                trace!(sender = %reply.sender, "Discarding repeated reply");
                            }
                        }
                        Err(error) => warn!(%error, key = entry.key(), "Skipping malformed reply"),
                    }
                }
                Ok(None) => {}
                Err(error) => {
                    let delay = backoff.next().unwrap_or(self.poll_interval);
                    warn!(%error, ?delay, "Failed to read replies, retrying");
                    sleep_until((Instant::now() + delay).min(deadline)).await;
                }
            }
        }

        entries
    }
}

async fn close<S: QueueSubscription>(subscription: S) {
    if let Err(error) = release(subscription).await {
        warn!(%error, "Failed to release reply consumer group");
    }
}
