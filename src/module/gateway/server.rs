use super::{DispatchOutcome, HealthAggregator, UserGateway};
use crate::constants::SERVICE_GATEWAY;
use crate::domain::{Action, ServiceIdentifier};
use crate::library::communication::event::{Publisher, QueueProvider};
use crate::library::communication::request::Requestor;
use crate::library::EmptyResult;
use async_trait::async_trait;
use jatsl::{Job, JobManager};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use warp::http::StatusCode;
use warp::hyper::body::Bytes;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

const BODY_LIMIT: u64 = 64 * 1024;
const BEARER_PREFIX: &str = "Bearer ";

/// Time to wait for the outcome of each kind of request
#[derive(Debug, Clone)]
pub struct Timeouts {
    #[allow(missing_docs)]
    pub register: Duration,
    #[allow(missing_docs)]
    pub login: Duration,
    #[allow(missing_docs)]
    pub profile: Duration,
    #[allow(missing_docs)]
    pub logout: Duration,
    /// Duration of a probing round
    pub health: Duration,
}

/// Shared state of all request handlers
pub struct GatewayContext<R, P, Q> {
    users: UserGateway<R>,
    health: HealthAggregator<P, Q>,
    peers: Vec<ServiceIdentifier>,
    timeouts: Timeouts,
}

impl<R, P, Q> GatewayContext<R, P, Q> {
    /// Creates a new context from raw parts
    pub fn new(
        users: UserGateway<R>,
        health: HealthAggregator<P, Q>,
        peers: Vec<ServiceIdentifier>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            users,
            health,
            peers,
            timeouts,
        }
    }
}

#[derive(Deserialize)]
struct Credentials {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    name: String,
}

/// All routes served by the gateway
pub fn routes<R, P, Q>(
    context: Arc<GatewayContext<R, P, Q>>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone
where
    R: Requestor + Send + Sync + 'static,
    P: Publisher + Send + Sync + 'static,
    Q: QueueProvider + Send + Sync + 'static,
{
    let with_context = warp::any().map(move || context.clone());
    let body = warp::body::content_length_limit(BODY_LIMIT).and(warp::body::bytes());
    let token = warp::header::optional::<String>("authorization");

    let status_route = warp::get()
        .and(warp::path::end())
        .map(|| warp::reply::json(&json!({ "status": "healthy", "service": SERVICE_GATEWAY })))
        .with(warp::trace::named("status"));

    let health_route = warp::get()
        .and(warp::path!("api" / "v1" / "services" / "health"))
        .and(with_context.clone())
        .and_then(services_health::<R, P, Q>)
        .with(warp::trace::named("health"));

    let register_route = warp::post()
        .and(warp::path!("api" / "v1" / "auth" / "register"))
        .and(with_context.clone())
        .and(body.clone())
        .and_then(register::<R, P, Q>)
        .with(warp::trace::named("register"));

    let login_route = warp::post()
        .and(warp::path!("api" / "v1" / "auth" / "login"))
        .and(with_context.clone())
        .and(body)
        .and_then(login::<R, P, Q>)
        .with(warp::trace::named("login"));

    let logout_route = warp::post()
        .and(warp::path!("api" / "v1" / "auth" / "logout"))
        .and(with_context.clone())
        .and(token.clone())
        .and_then(logout::<R, P, Q>)
        .with(warp::trace::named("logout"));

    let profile_route = warp::get()
        .and(warp::path!("api" / "v1" / "users" / "profile"))
        .and(with_context)
        .and(token)
        .and_then(profile::<R, P, Q>)
        .with(warp::trace::named("profile"));

    status_route
        .or(health_route)
        .or(register_route)
        .or(login_route)
        .or(logout_route)
        .or(profile_route)
        .with(warp::trace::request())
}

fn reply<T: Serialize>(status: StatusCode, body: &T) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn error(status: StatusCode, message: &str) -> Response {
    reply(status, &json!({ "error": message }))
}

fn outcome(outcome: DispatchOutcome) -> Response {
    match outcome {
        DispatchOutcome::Responded(response) => {
            let status =
                StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            reply(status, &response.payload)
        }
        DispatchOutcome::TimedOut => error(StatusCode::REQUEST_TIMEOUT, "Request timeout"),
        DispatchOutcome::Unavailable => {
            error(StatusCode::SERVICE_UNAVAILABLE, "Failed to process request")
        }
    }
}

fn credentials(body: &Bytes) -> Result<Credentials, Response> {
    let credentials: Credentials = serde_json::from_slice(body)
        .map_err(|_| error(StatusCode::BAD_REQUEST, "Invalid request format"))?;

    if credentials.email.trim().is_empty() || credentials.password.is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "Email and password are required"));
    }

    Ok(credentials)
}

fn bearer_token(header: Option<String>) -> Result<String, Response> {
    header
        .as_deref()
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| error(StatusCode::UNAUTHORIZED, "Authorization token required"))
}

async fn services_health<R, P, Q>(
    context: Arc<GatewayContext<R, P, Q>>,
) -> Result<Response, Infallible>
where
    P: Publisher + Send + Sync,
    Q: QueueProvider + Send + Sync,
{
    let result = context
        .health
        .probe_all(&context.peers, context.timeouts.health)
        .await;

    Ok(match result {
        Ok(report) => {
            let status = if report.complete {
                StatusCode::OK
            } else {
                StatusCode::PARTIAL_CONTENT
            };

            reply(status, &report)
        }
        Err(e) => reply(
            StatusCode::SERVICE_UNAVAILABLE,
            &json!({ "error": "Failed to communicate with services", "details": e.to_string() }),
        ),
    })
}

async fn register<R, P, Q>(
    context: Arc<GatewayContext<R, P, Q>>,
    body: Bytes,
) -> Result<Response, Infallible>
where
    R: Requestor + Send + Sync,
{
    let credentials = match credentials(&body) {
        Ok(credentials) => credentials,
        Err(response) => return Ok(response),
    };

    debug!("Forwarding registration");
    let payload = json!({
        "email": credentials.email,
        "password": credentials.password,
        "name": credentials.name,
    });

    let result = context
        .users
        .dispatch(Action::Register, payload, context.timeouts.register)
        .await;

    Ok(outcome(result))
}

async fn login<R, P, Q>(
    context: Arc<GatewayContext<R, P, Q>>,
    body: Bytes,
) -> Result<Response, Infallible>
where
    R: Requestor + Send + Sync,
{
    let credentials = match credentials(&body) {
        Ok(credentials) => credentials,
        Err(response) => return Ok(response),
    };

    debug!("Forwarding login");
    let payload = json!({ "email": credentials.email, "password": credentials.password });

    let result = context
        .users
        .dispatch(Action::Login, payload, context.timeouts.login)
        .await;

    Ok(outcome(result))
}

async fn logout<R, P, Q>(
    context: Arc<GatewayContext<R, P, Q>>,
    authorization: Option<String>,
) -> Result<Response, Infallible>
where
    R: Requestor + Send + Sync,
{
    let token = match bearer_token(authorization) {
        Ok(token) => token,
        Err(response) => return Ok(response),
    };

    let result = context
        .users
        .dispatch(Action::Logout, json!({ "token": token }), context.timeouts.logout)
        .await;

    Ok(outcome(result))
}

async fn profile<R, P, Q>(
    context: Arc<GatewayContext<R, P, Q>>,
    authorization: Option<String>,
) -> Result<Response, Infallible>
where
    R: Requestor + Send + Sync,
{
    let token = match bearer_token(authorization) {
        Ok(token) => token,
        Err(response) => return Ok(response),
    };

    let result = context
        .users
        .dispatch(Action::GetProfile, json!({ "token": token }), context.timeouts.profile)
        .await;

    Ok(outcome(result))
}

/// Job serving the HTTP interface
pub struct ServerJob<R, P, Q> {
    port: u16,
    context: Arc<GatewayContext<R, P, Q>>,
}

impl<R, P, Q> ServerJob<R, P, Q> {
    /// Creates a new job serving on all interfaces at the given port
    pub fn new(port: u16, context: GatewayContext<R, P, Q>) -> Self {
        Self {
            port,
            context: Arc::new(context),
        }
    }
}

#[async_trait]
impl<R, P, Q> Job for ServerJob<R, P, Q>
where
    R: Requestor + Send + Sync + 'static,
    P: Publisher + Send + Sync + 'static,
    Q: QueueProvider + Send + Sync + 'static,
{
    const NAME: &'static str = module_path!();
    const SUPPORTS_GRACEFUL_TERMINATION: bool = true;

    async fn execute(&self, manager: JobManager) -> EmptyResult {
        let routes = routes(self.context.clone());

        let source_addr: SocketAddr = ([0, 0, 0, 0], self.port).into();
        let (addr, server) =
            warp::serve(routes).bind_with_graceful_shutdown(source_addr, manager.termination_signal());

        info!(?addr, "Serving gateway API");
        manager.ready().await;
        server.await;

        Ok(())
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::domain::Topics;
    use crate::library::communication::event::{ConsumerExt, ConsumerGroupDescriptor, QueueLocation};
    use crate::library::communication::implementation::memory::MemoryBus;
    use crate::library::communication::request::Responder;
    use crate::library::communication::CommunicationFactory;
    use crate::module::probe::{AlwaysHealthy, ProbeResponder};
    use crate::module::users::{Accounts, MemorySessionStore, MemoryUserStore, UserService};
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn timeouts(request: Duration) -> Timeouts {
        Timeouts {
            register: request,
            login: request,
            profile: request,
            logout: request,
            health: Duration::from_millis(300),
        }
    }

    fn context(
        bus: &MemoryBus,
        peers: &[&str],
        request_timeout: Duration,
    ) -> Arc<
        GatewayContext<
            impl Requestor + Send + Sync + 'static,
            impl Publisher + Send + Sync + 'static,
            impl QueueProvider + Send + Sync + 'static,
        >,
    > {
        let topics = Topics::default();
        let users = UserGateway::new(bus.requestor(
            topics.requests.clone(),
            topics.responses.clone(),
            "api-gateway",
        ));
        let health = HealthAggregator::new(bus.clone(), bus.clone(), topics.ping, topics.pong, "api-gateway")
            .with_poll_interval(Duration::from_millis(20));
        let peers = peers.iter().map(|peer| (*peer).to_owned()).collect();

        Arc::new(GatewayContext::new(users, health, peers, timeouts(request_timeout)))
    }

    fn spawn_user_service(bus: &MemoryBus) {
        let bus = bus.clone();

        tokio::spawn(async move {
            let topics = Topics::default();
            let accounts = Accounts::new(
                MemoryUserStore::default(),
                MemorySessionStore::default(),
                Duration::from_secs(60),
            );
            let worker = Responder::new(UserService::new(accounts), bus.clone(), topics.responses.clone());
            let group = ConsumerGroupDescriptor::durable("user-service", QueueLocation::Head);

            worker.consume_queue(&bus, &topics.requests, &group, "worker").await.ok();
        });
    }

    fn spawn_peer(bus: &MemoryBus, service: &str) {
        let bus = bus.clone();
        let service = service.to_owned();

        tokio::spawn(async move {
            let topics = Topics::default();
            let group = ConsumerGroupDescriptor::durable(format!("{}-probe", service), QueueLocation::Head);
            let responder = ProbeResponder::new(service, AlwaysHealthy, bus.clone(), topics.pong.clone());

            responder.consume_queue(&bus, &topics.ping, &group, "peer").await.ok();
        });
    }

    fn body(response: &warp::http::Response<Bytes>) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[tokio::test]
    async fn report_its_own_status() {
        let bus = MemoryBus::default();
        let filter = routes(context(&bus, &[], Duration::from_secs(1)));

        let response = warp::test::request().method("GET").path("/").reply(&filter).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body(&response), json!({ "status": "healthy", "service": "api-gateway" }));
    }

    #[tokio::test]
    async fn validate_credentials_locally() {
        let bus = MemoryBus::default();
        let filter = routes(context(&bus, &[], Duration::from_secs(1)));

        let missing = warp::test::request()
            .method("POST")
            .path("/api/v1/auth/register")
            .body(r#"{"email":"a@x.com"}"#)
            .reply(&filter)
            .await;
        let malformed = warp::test::request()
            .method("POST")
            .path("/api/v1/auth/login")
            .body("{email")
            .reply(&filter)
            .await;

        assert_eq!(missing.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&missing), json!({ "error": "Email and password are required" }));
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&malformed), json!({ "error": "Invalid request format" }));
        assert_eq!(bus.len(&Topics::default().requests), 0);
    }

    #[tokio::test]
    async fn require_bearer_tokens() {
        let bus = MemoryBus::default();
        let filter = routes(context(&bus, &[], Duration::from_secs(1)));

        let profile = warp::test::request()
            .method("GET")
            .path("/api/v1/users/profile")
            .reply(&filter)
            .await;
        let logout = warp::test::request()
            .method("POST")
            .path("/api/v1/auth/logout")
            .header("authorization", "Basic abc")
            .reply(&filter)
            .await;

        assert_eq!(profile.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(logout.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn time_out_without_user_service() {
        let bus = MemoryBus::default();
        let filter = routes(context(&bus, &[], Duration::from_millis(100)));

        let response = warp::test::request()
            .method("POST")
            .path("/api/v1/auth/login")
            .body(r#"{"email":"a@x.com","password":"correct horse"}"#)
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(body(&response), json!({ "error": "Request timeout" }));
    }

    #[tokio::test]
    async fn fail_while_the_bus_is_unavailable() {
        let bus = MemoryBus::default();
        let filter = routes(context(&bus, &["a"], Duration::from_millis(100)));
        bus.set_outage(true);

        let login = warp::test::request()
            .method("POST")
            .path("/api/v1/auth/login")
            .body(r#"{"email":"a@x.com","password":"correct horse"}"#)
            .reply(&filter)
            .await;
        let health = warp::test::request()
            .method("GET")
            .path("/api/v1/services/health")
            .reply(&filter)
            .await;

        assert_eq!(login.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body(&login), json!({ "error": "Failed to process request" }));
        assert_eq!(health.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn report_partial_and_complete_health() {
        let bus = MemoryBus::default();
        spawn_peer(&bus, "catalog-service");
        tokio::time::sleep(Duration::from_millis(50)).await;

        let partial = routes(context(&bus, &["catalog-service", "user-service"], Duration::from_secs(1)));
        let complete = routes(context(&bus, &["catalog-service"], Duration::from_secs(1)));

        let partial = warp::test::request()
            .method("GET")
            .path("/api/v1/services/health")
            .reply(&partial)
            .await;
        let complete = warp::test::request()
            .method("GET")
            .path("/api/v1/services/health")
            .reply(&complete)
            .await;

        assert_eq!(partial.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(body(&partial)["total_services"], 2);
        assert_eq!(body(&partial)["responding_services"], 1);
        assert_eq!(complete.status(), StatusCode::OK);
        assert_eq!(body(&complete)["services"][0]["service"], "catalog-service");
    }

    #[tokio::test]
    async fn forward_account_requests() {
        let bus = MemoryBus::default();
        spawn_user_service(&bus);
        let filter = routes(context(&bus, &[], Duration::from_secs(10)));
        let credentials = r#"{"email":"a@x.com","password":"correct horse","name":"Ada"}"#;

        let registered = warp::test::request()
            .method("POST")
            .path("/api/v1/auth/register")
            .body(credentials)
            .reply(&filter)
            .await;
        let duplicate = warp::test::request()
            .method("POST")
            .path("/api/v1/auth/register")
            .body(credentials)
            .reply(&filter)
            .await;
        let login = warp::test::request()
            .method("POST")
            .path("/api/v1/auth/login")
            .body(credentials)
            .reply(&filter)
            .await;

        assert_eq!(registered.status(), StatusCode::CREATED);
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);
        assert_eq!(body(&duplicate), json!({ "error": "email already registered" }));
        assert_eq!(login.status(), StatusCode::OK);

        let token = body(&login)["token"].as_str().unwrap().to_owned();
        let profile = warp::test::request()
            .method("GET")
            .path("/api/v1/users/profile")
            .header("authorization", format!("Bearer {}", token))
            .reply(&filter)
            .await;

        assert_eq!(profile.status(), StatusCode::OK);
        assert_eq!(body(&profile)["user"]["email"], "a@x.com");
    }
}
