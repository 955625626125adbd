use crate::library::communication::implementation::redis::RedisFactory;
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Key-value storage with expiring entries, used to hold sessions
#[async_trait]
pub trait SessionStore {
    /// Stores a value which expires after `ttl`
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> EmptyResult;

    /// Retrieves a value unless it does not exist or has expired
    async fn get(&self, key: &str) -> Result<Option<String>, BoxedError>;

    /// Removes a value, succeeds if it does not exist
    async fn delete(&self, key: &str) -> EmptyResult;

    /// Verifies that the storage is reachable
    async fn ping(&self) -> EmptyResult;
}

/// [`SessionStore`] using plain redis keys with an expiry
#[derive(Clone)]
pub struct RedisSessionStore<F> {
    factory: F,
}

impl<F: RedisFactory> RedisSessionStore<F> {
    /// Creates a new store which obtains connections from the given factory
    pub fn new(factory: F) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl<F> SessionStore for RedisSessionStore<F>
where
    F: RedisFactory + Send + Sync,
{
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> EmptyResult {
        let mut con = self.factory.multiplexed().await?;
        let seconds = ttl.as_secs().max(1) as usize;

        con.set_ex::<_, _, ()>(key, value, seconds)
            .await
            .map_err(|e| {
                self.factory.report_failure(&e);
                e
            })?;

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BoxedError> {
        let mut con = self.factory.multiplexed().await?;

        let value = con.get::<_, Option<String>>(key).await.map_err(|e| {
            self.factory.report_failure(&e);
            e
        })?;

        Ok(value)
    }

    async fn delete(&self, key: &str) -> EmptyResult {
        let mut con = self.factory.multiplexed().await?;

        con.del::<_, ()>(key).await.map_err(|e| {
            self.factory.report_failure(&e);
            e
        })?;

        Ok(())
    }

    async fn ping(&self) -> EmptyResult {
        let mut con = self.factory.multiplexed().await?;

        redis::cmd("PING")
            .query_async::<_, ()>(&mut con)
            .await
            .map_err(|e| {
                self.factory.report_failure(&e);
                e
            })?;

        Ok(())
    }
}

/// [`SessionStore`] keeping entries in the memory of the current process
///
/// Expired entries are dropped lazily when they are read.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    entries: Arc<Mutex<HashMap<String, (String, Instant)>>>,
}

impl MemorySessionStore {
    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, (String, Instant)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> EmptyResult {
        let expiry = Instant::now()
            .checked_add(ttl)
            .ok_or("session lifetime out of range")?;
        self.entries()
            .insert(key.to_owned(), (value.to_owned(), expiry));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BoxedError> {
        let mut entries = self.entries();

        match entries.get(key) {
            Some((_, expiry)) if *expiry <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> EmptyResult {
        self.entries().remove(key);
        Ok(())
    }

    async fn ping(&self) -> EmptyResult {
        Ok(())
    }
}
