use crate::library::communication::implementation::redis::{
    RedisFactory, RedisPublisher, RedisQueueProvider,
};
use crate::library::communication::CommunicationFactory;
use crate::library::BoxedError;
use async_trait::async_trait;
use redis::aio::{Connection, MultiplexedConnection};
use redis::{Client, RedisError};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

const CONNECT_ATTEMPTS: usize = 5;
const RETRY_INTERVAL: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(4);

/// Error raised when the redis server stays unreachable
#[derive(Debug, Error)]
#[error("unable to connect to redis after {attempts} attempts")]
pub struct RedisConnectError {
    attempts: usize,
    #[source]
    last: Option<RedisError>,
}

/// Creates connections to a single redis server
///
/// Multiplexed connections are shared between all clones of the factory and replaced
/// when a command reports the connection as broken.
#[derive(Clone)]
pub struct RedisConnectionFactory {
    client: Client,
    shared: Arc<Mutex<Option<MultiplexedConnection>>>,
}

impl RedisConnectionFactory {
    /// Creates a new factory for the server at the given URL without connecting to it
    pub fn new(url: &str) -> Result<Self, RedisError> {
        Ok(Self {
            client: Client::open(url)?,
            shared: Arc::new(Mutex::new(None)),
        })
    }

    fn cached(&self) -> Option<MultiplexedConnection> {
        self.shared
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn connect<T, Fut>(&self, mut attempt: impl FnMut() -> Fut) -> Result<T, RedisConnectError>
    where
        Fut: Future<Output = Result<T, RedisError>>,
    {
        let mut last = None;

        for round in 1..=CONNECT_ATTEMPTS {
            match timeout(REQUEST_TIMEOUT, attempt()).await {
                Ok(Ok(connection)) => return Ok(connection),
                Ok(Err(e)) => {
                    warn!(round, "Unable to connect to redis server! ({})", e);
                    last = Some(e);
                }
                Err(_) => warn!(round, "Timed out while connecting to redis!"),
            }

            if round < CONNECT_ATTEMPTS {
                sleep(RETRY_INTERVAL).await;
            }
        }

        Err(RedisConnectError {
            attempts: CONNECT_ATTEMPTS,
            last,
        })
    }
}

#[async_trait]
impl RedisFactory for RedisConnectionFactory {
    async fn owned(&self) -> Result<Connection, BoxedError> {
        let client = &self.client;
        Ok(self.connect(move || client.get_async_connection()).await?)
    }

    async fn multiplexed(&self) -> Result<MultiplexedConnection, BoxedError> {
        if let Some(connection) = self.cached() {
            return Ok(connection);
        }

        let client = &self.client;
        let connection = self
            .connect(move || client.get_multiplexed_tokio_connection())
            .await?;

        debug!("Established shared redis connection");
        *self.shared.lock().unwrap_or_else(PoisonError::into_inner) = Some(connection.clone());

        Ok(connection)
    }

    fn report_failure(&self, error: &RedisError) {
        if error.is_connection_dropped()
            || error.is_io_error()
            || error.is_connection_refusal()
            || error.is_timeout()
        {
            debug!(%error, "Discarding shared redis connection");
            *self.shared.lock().unwrap_or_else(PoisonError::into_inner) = None;
        }
    }
}

/// [`CommunicationFactory`] backed by redis streams
#[derive(Clone)]
pub struct RedisCommunicationFactory {
    connections: RedisConnectionFactory,
}

impl RedisCommunicationFactory {
    /// Creates a new factory for the server at the given URL
    pub fn new(url: &str) -> Result<Self, RedisError> {
        Ok(Self {
            connections: RedisConnectionFactory::new(url)?,
        })
    }

    /// Underlying connection factory, e.g. for storage purposes
    pub fn connections(&self) -> &RedisConnectionFactory {
        &self.connections
    }
}

impl CommunicationFactory for RedisCommunicationFactory {
    type QueueProvider = RedisQueueProvider<RedisConnectionFactory>;
    type Publisher = RedisPublisher<RedisConnectionFactory>;

    fn queue_provider(&self) -> Self::QueueProvider {
        RedisQueueProvider::new(self.connections.clone())
    }

    fn publisher(&self) -> Self::Publisher {
        RedisPublisher::new(self.connections.clone())
    }
}
