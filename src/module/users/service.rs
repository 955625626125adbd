use super::{AccountError, Accounts, SessionStore, UserStore};
use crate::domain::{Action, RequestEnvelope, ResponseEnvelope};
use crate::harness::Service;
use crate::library::communication::event::QueueDescriptor;
use crate::library::communication::request::{RequestProcessor, Responder};
use crate::library::communication::CommunicationFactory;
use crate::library::BoxedError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

/// Parameters of the [`UserService`]
pub struct UserServiceConfig<U, S> {
    /// Business rules to apply
    pub accounts: Accounts<U, S>,
    /// Queue responses are published to
    pub responses: QueueDescriptor,
}

/// Processes [`RequestEnvelopes`](RequestEnvelope) by applying the account rules
pub struct UserService<U, S> {
    accounts: Accounts<U, S>,
}

impl<U, S> UserService<U, S>
where
    U: UserStore + Send + Sync,
    S: SessionStore + Send + Sync,
{
    /// Creates a new instance using the given business rules
    pub fn new(accounts: Accounts<U, S>) -> Self {
        Self { accounts }
    }
}

impl<F, U, S> Service<F> for UserService<U, S>
where
    F: CommunicationFactory + Send + Sync,
    U: UserStore + Clone + Send + Sync,
    S: SessionStore + Clone + Send + Sync,
{
    const NAME: &'static str = "UserService";
    type Instance = Responder<UserService<U, S>, F::Publisher>;
    type Config = UserServiceConfig<U, S>;

    fn instantiate(factory: F, config: &Self::Config) -> Self::Instance {
        Responder::new(
            UserService::new(config.accounts.clone()),
            factory.publisher(),
            config.responses.clone(),
        )
    }
}

#[async_trait]
impl<U, S> RequestProcessor for UserService<U, S>
where
    U: UserStore + Send + Sync,
    S: SessionStore + Send + Sync,
{
    type Request = RequestEnvelope;

    #[instrument(skip(self, request), fields(correlation_id = %request.correlation_id, action = %request.action))]
    async fn maybe_process(&self, request: RequestEnvelope) -> Result<Option<ResponseEnvelope>, BoxedError> {
        let RequestEnvelope {
            correlation_id,
            action,
            payload,
            ..
        } = request;

        let outcome = match action {
            Action::Register => match decode(payload) {
                Ok(request) => encode(201, self.accounts.register(request).await),
                Err(e) => Err(e),
            },
            Action::Login => match decode(payload) {
                Ok(request) => encode(200, self.accounts.login(request).await),
                Err(e) => Err(e),
            },
            Action::GetProfile => match decode(payload) {
                Ok(request) => encode(200, self.accounts.profile(request).await),
                Err(e) => Err(e),
            },
            Action::Logout => match decode(payload) {
                Ok(request) => encode(200, self.accounts.logout(request).await),
                Err(e) => Err(e),
            },
            Action::Unknown(name) => {
                warn!(action = %name, "Ignoring request with unknown action");
                return Ok(None);
            }
        };

        let response = match outcome {
            Ok((status_code, data)) => ResponseEnvelope::success(correlation_id, status_code, data),
            Err(AccountError::Internal(e)) => return Err(e),
            Err(e) => {
                debug!(error = %e, "Request refused");
                ResponseEnvelope::failure(correlation_id, e.status_code(), &e.to_string())
            }
        };

        Ok(Some(response))
    }
}

fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, AccountError> {
    serde_json::from_value(payload).map_err(AccountError::MalformedRequest)
}

fn encode<T: Serialize>(
    status_code: u16,
    result: Result<T, AccountError>,
) -> Result<(u16, Value), AccountError> {
    let data = serde_json::to_value(result?).map_err(|e| AccountError::Internal(e.into()))?;
    Ok((status_code, data))
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::domain::Topics;
    use crate::harness::Service;
    use crate::library::communication::event::{ConsumerExt, ConsumerGroupDescriptor, QueueLocation};
    use crate::library::communication::implementation::memory::MemoryBus;
    use crate::library::communication::request::{RequestError, Requestor};
    use crate::module::users::{MemorySessionStore, MemoryUserStore};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;

    fn service() -> UserService<MemoryUserStore, MemorySessionStore> {
        UserService::new(Accounts::new(
            MemoryUserStore::default(),
            MemorySessionStore::default(),
            Duration::from_secs(60),
        ))
    }

    async fn process(
        service: &UserService<MemoryUserStore, MemorySessionStore>,
        action: Action,
        payload: Value,
    ) -> Option<ResponseEnvelope> {
        service
            .maybe_process(RequestEnvelope::new(action, payload))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn respond_to_registrations() {
        let service = service();
        let request = RequestEnvelope::new(
            Action::Register,
            json!({ "email": "a@x.com", "password": "correct horse", "name": "Ada" }),
        );
        let correlation_id = request.correlation_id.clone();

        let response = service.maybe_process(request).await.unwrap().unwrap();

        assert_eq!(response.correlation_id, correlation_id);
        assert_eq!(response.status_code, 201);
        assert_eq!(response.payload["user"]["email"], "a@x.com");
        assert!(response.payload["user"].get("password_hash").is_none());
    }

    #[tokio::test]
    async fn reject_malformed_payloads() {
        let service = service();

        let response = process(&service, Action::Login, json!({ "email": 42 }))
            .await
            .unwrap();

        assert_eq!(response.status_code, 400);
        assert_eq!(response.error.as_deref(), Some("invalid request format"));
        assert_eq!(response.payload, json!({ "error": "invalid request format" }));
    }

    #[tokio::test]
    async fn refuse_unknown_sessions() {
        let service = service();

        let profile = process(&service, Action::GetProfile, json!({ "token": "nope" }))
            .await
            .unwrap();
        let logout = process(&service, Action::Logout, json!({ "token": "nope" }))
            .await
            .unwrap();

        assert_eq!(profile.status_code, 401);
        assert_eq!(logout.status_code, 200);
    }

    #[tokio::test]
    async fn ignore_unknown_actions() {
        let service = service();

        let response = process(&service, Action::Unknown("reset_password".into()), json!({})).await;

        assert_eq!(response, None);
    }

    #[tokio::test]
    async fn serve_requests_over_the_bus() {
        let bus = MemoryBus::default();
        let topics = Topics::default();
        let config = UserServiceConfig {
            accounts: service().accounts,
            responses: topics.responses.clone(),
        };
        let worker = <UserService<_, _> as Service<MemoryBus>>::instantiate(bus.clone(), &config);
        let group = ConsumerGroupDescriptor::durable("user-service", QueueLocation::Tail);

        let consumer_bus = bus.clone();
        let requests = topics.requests.clone();
        let handle = tokio::spawn(async move {
            worker
                .consume_queue(&consumer_bus, &requests, &group, "worker-1")
                .await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let requestor = bus.requestor(topics.requests.clone(), topics.responses.clone(), "gateway");
        let payload = json!({ "email": "a@x.com", "password": "correct horse", "name": "Ada" });
        let timeout = Duration::from_secs(10);

        let first = requestor
            .request(&RequestEnvelope::new(Action::Register, payload.clone()), timeout)
            .await
            .unwrap();
        let second = requestor
            .request(&RequestEnvelope::new(Action::Register, payload), timeout)
            .await
            .unwrap();

        assert_eq!(first.status_code, 201);
        assert_eq!(second.status_code, 409);
        assert_eq!(second.error.as_deref(), Some("email already registered"));

        let unknown = requestor
            .request(
                &RequestEnvelope::new(Action::Unknown("reset_password".into()), json!({})),
                Duration::from_millis(300),
            )
            .await;
        assert!(matches!(unknown, Err(RequestError::Timeout(_))));

        handle.abort();
    }
}
