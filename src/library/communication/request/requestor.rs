use super::{CollectionError, CorrelationTracker, Request};
use crate::library::communication::event::{
    DeadlineExceeded, Publisher, QueueDescriptor, QueueProvider,
};
use crate::library::BoxedError;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, instrument};

/// Error type for sending requests
#[derive(Error, Debug)]
pub enum RequestError {
    /// Publishing of the request failed
    #[error("sending of request failed")]
    SendingFailure(#[source] BoxedError),
    /// Response collector was unable to start listening for responses
    #[error("unable to collect responses")]
    ResponseCollectionFailed(#[source] BoxedError),
    /// No response arrived within the given duration
    #[error("no response received within {0:?}")]
    Timeout(Duration),
}

impl From<CollectionError> for RequestError {
    fn from(error: CollectionError) -> Self {
        match error {
            CollectionError::Timeout(timeout) => RequestError::Timeout(timeout),
            CollectionError::SubscriptionFailed(e) => RequestError::ResponseCollectionFailed(e),
        }
    }
}

/// Handler for sending requests and awaiting their response
#[async_trait]
pub trait Requestor {
    /// Sends out a request and waits at most `timeout` for the matching response
    async fn request<R>(&self, request: &R, timeout: Duration) -> Result<R::Response, RequestError>
    where
        R: Request + Send + Sync;
}

/// [`Requestor`] implementation by combining a [`Publisher`] and [`CorrelationTracker`]
pub struct CompositeRequestor<P, Q> {
    publisher: P,
    tracker: CorrelationTracker<Q>,
    queue: QueueDescriptor,
}

impl<P, Q> CompositeRequestor<P, Q>
where
    P: Publisher,
    Q: QueueProvider + Send + Sync,
{
    /// Creates a new instance which publishes requests to the given queue
    pub fn new(publisher: P, tracker: CorrelationTracker<Q>, queue: QueueDescriptor) -> Self {
        Self {
            publisher,
            tracker,
            queue,
        }
    }
}

#[async_trait]
impl<P, Q> Requestor for CompositeRequestor<P, Q>
where
    P: Publisher + Send + Sync,
    Q: QueueProvider + Send + Sync,
{
    /// Starts listening for the response, publishes the request exactly once and waits for the response to arrive
    ///
    /// Every step shares the same deadline, so an unresponsive bus never delays the outcome much beyond `timeout`.
    #[instrument(skip(self, request), fields(correlation_id = request.correlation_id()))]
    async fn request<R>(&self, request: &R, timeout: Duration) -> Result<R::Response, RequestError>
    where
        R: Request + Send + Sync,
    {
        let deadline = Instant::now() + timeout;
        let pending = self
            .tracker
            .listen_before::<R::Response>(request.correlation_id(), deadline)
            .await?;

        let publication = timeout_at(
            deadline,
            self.publisher
                .publish(&self.queue, request.correlation_id(), request),
        )
        .await
        .unwrap_or_else(|_| Err(DeadlineExceeded.into()));

        if let Err(error) = publication {
            pending.close().await;
            return Err(RequestError::SendingFailure(error));
        }

        debug!(queue = self.queue.key(), "Request published");

        pending
            .wait_until(deadline)
            .await
            .ok_or(RequestError::Timeout(timeout))
    }
}
