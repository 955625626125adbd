use crate::library::BoxedError;
use async_trait::async_trait;
use redis::aio::{Connection, MultiplexedConnection};
use redis::RedisError;

/// Factory for redis connections
///
/// Implementations are handed to the structures in this module explicitly,
/// there is no process-wide connection state.
#[async_trait]
pub trait RedisFactory {
    /// Individual connection that allows for blocking commands without disturbing other users.
    /// Used by consumers that run long, blocking reads.
    async fn owned(&self) -> Result<Connection, BoxedError>;

    /// Connection that is shared between multiple users and does not permit blocking commands
    async fn multiplexed(&self) -> Result<MultiplexedConnection, BoxedError>;

    /// Called whenever a command on a [`multiplexed`](RedisFactory::multiplexed) connection fails
    fn report_failure(&self, _error: &RedisError) {}
}
