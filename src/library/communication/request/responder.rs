use super::{Correlated, Request};
use crate::library::communication::event::{Consumer, Publisher, QueueDescriptor};
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error};

/// Error that may be thrown while responding to a request
#[derive(Error, Debug)]
pub enum ResponderError {
    /// The [`RequestProcessor`] threw an error and no fallback response exists
    #[error("processing request failed")]
    ProcessingFailed(#[source] BoxedError),
    /// Unable to deliver the response
    #[error("sending response failed")]
    ResponseUndeliverable(#[source] BoxedError),
}

/// Structure which processes requests and may either produce a response or ignore the request
#[async_trait]
pub trait RequestProcessor {
    /// Type of request to process
    type Request: Request;

    /// Handler for requests, returning an optional response
    ///
    /// Errors are reserved for unexpected failures. Expected, subject specific failures
    /// have to be conveyed with a response instead!
    async fn maybe_process(
        &self,
        request: Self::Request,
    ) -> Result<Option<<Self::Request as Request>::Response>, BoxedError>;
}

/// Convenience wrapper to process requests and send responses
pub struct Responder<C, P> {
    processor: C,
    publisher: P,
    queue: QueueDescriptor,
}

impl<C, P> Responder<C, P>
where
    C: RequestProcessor,
    P: Publisher,
{
    /// Creates a new responder which sends its responses to the given queue
    pub fn new(processor: C, publisher: P, queue: QueueDescriptor) -> Self {
        Self {
            processor,
            publisher,
            queue,
        }
    }
}

#[async_trait]
impl<C, P> Consumer for Responder<C, P>
where
    C: RequestProcessor + Send + Sync,
    C::Request: DeserializeOwned + Send + Sync,
    P: Publisher + Send + Sync,
{
    type Message = C::Request;

    async fn consume(&self, request: Self::Message) -> EmptyResult {
        let correlation_id = request.correlation_id().to_owned();

        let response = match self.processor.maybe_process(request).await {
            Ok(Some(response)) => response,
            Ok(None) => {
                debug!(%correlation_id, "Request ignored by processor");
                return Ok(());
            }
            Err(e) => {
                error!(error = %e, %correlation_id, "Processing request failed");

                match <C::Request as Request>::failure_response(correlation_id.clone(), &e) {
                    Some(response) => response,
                    None => return Err(ResponderError::ProcessingFailed(e).into()),
                }
            }
        };

        self.publisher
            .publish(&self.queue, &correlation_id, &response)
            .await
            .map_err(ResponderError::ResponseUndeliverable)?;

        Ok(())
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::library::communication::event::{
        ConsumerGroupDescriptor, QueueEntry, QueueLocation, QueueProvider, QueueSubscription,
        RawQueueEntry,
    };
    use crate::library::communication::implementation::memory::MemoryBus;
    use pretty_assertions::assert_eq;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Debug, Serialize, Deserialize)]
    struct Question {
        correlation_id: String,
        text: String,
    }

    impl Correlated for Question {
        fn correlation_id(&self) -> &str {
            &self.correlation_id
        }
    }

    impl Request for Question {
        type Response = Answer;

        fn failure_response(correlation_id: String, _error: &BoxedError) -> Option<Answer> {
            Some(Answer {
                correlation_id,
                text: "something went wrong".into(),
            })
        }
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Answer {
        correlation_id: String,
        text: String,
    }

    impl Correlated for Answer {
        fn correlation_id(&self) -> &str {
            &self.correlation_id
        }
    }

    struct Oracle;

    #[async_trait]
    impl RequestProcessor for Oracle {
        type Request = Question;

        async fn maybe_process(&self, request: Question) -> Result<Option<Answer>, BoxedError> {
            match request.text.as_str() {
                "meaning of life" => Ok(Some(Answer {
                    correlation_id: request.correlation_id,
                    text: "42".into(),
                })),
                "explode" => Err("oracle exploded".into()),
                _ => Ok(None),
            }
        }
    }

    fn answers() -> QueueDescriptor {
        QueueDescriptor::new("answers".into(), 100)
    }

    fn question(id: &str, text: &str) -> Question {
        Question {
            correlation_id: id.to_owned(),
            text: text.to_owned(),
        }
    }

    async fn published_answers(bus: &MemoryBus) -> Vec<(String, Answer)> {
        let group = ConsumerGroupDescriptor::durable("inspector", QueueLocation::Head);
        let mut subscription = bus.subscribe(&answers(), &group, "inspector").await.unwrap();
        let mut answers = Vec::new();

        let deadline = Instant::now() + Duration::from_millis(50);
        while let Some(entry) = subscription.next_before(deadline).await.unwrap() {
            answers.push((entry.key().to_owned(), entry.parse_payload().unwrap()));
        }

        answers
    }

    #[tokio::test]
    async fn publish_responses_keyed_by_correlation_id() {
        let bus = MemoryBus::default();
        let responder = Responder::new(Oracle, bus.clone(), answers());

        responder
            .consume(question("q-1", "meaning of life"))
            .await
            .unwrap();

        let expected = Answer {
            correlation_id: "q-1".into(),
            text: "42".into(),
        };
        assert_eq!(published_answers(&bus).await, vec![("q-1".into(), expected)]);
    }

    #[tokio::test]
    async fn stay_silent_for_ignored_requests() {
        let bus = MemoryBus::default();
        let responder = Responder::new(Oracle, bus.clone(), answers());

        responder.consume(question("q-2", "weather")).await.unwrap();

        assert_eq!(bus.len(&answers()), 0);
    }

    #[tokio::test]
    async fn substitute_the_failure_response_for_processing_errors() {
        let bus = MemoryBus::default();
        let responder = Responder::new(Oracle, bus.clone(), answers());

        responder.consume(question("q-3", "explode")).await.unwrap();

        let published = published_answers(&bus).await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].1.text, "something went wrong");
    }

    #[tokio::test]
    async fn report_undeliverable_responses() {
        let bus = MemoryBus::default();
        let responder = Responder::new(Oracle, bus.clone(), answers());
        bus.set_outage(true);

        let result = responder.consume(question("q-4", "meaning of life")).await;

        assert!(result.is_err());
    }
}
