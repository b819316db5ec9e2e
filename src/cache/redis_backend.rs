//! Redis/Valkey cache store.
//!
//! One multiplexed connection is opened lazily and shared by every clone of
//! the store. A connection-level failure or a timed-out command drops it, so
//! the next operation reconnects. Every command is bounded by a timeout.

use super::{CacheError, CacheStore};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, ErrorKind, RedisError, RedisResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    conn: Arc<Mutex<Option<MultiplexedConnection>>>,
    connect_timeout: Duration,
    command_timeout: Duration,
}

impl RedisStore {
    /// Parse the URL without connecting. `rediss://` URLs use TLS.
    pub fn new(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        Ok(Self {
            client,
            conn: Arc::new(Mutex::new(None)),
            connect_timeout: CONNECT_TIMEOUT,
            command_timeout: COMMAND_TIMEOUT,
        })
    }

    pub fn with_timeouts(mut self, connect: Duration, command: Duration) -> Self {
        self.connect_timeout = connect;
        self.command_timeout = command;
        self
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = timeout(
            self.connect_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| CacheError::Timeout(self.connect_timeout))??;
        info!(addr = %self.client.get_connection_info().addr, "connected to redis cache");
        *slot = Some(conn.clone());
        Ok(conn)
    }

    /// Run one command on the shared connection, dropping the connection when
    /// the failure means it can no longer be trusted.
    async fn run<T, F, Fut>(&self, command: F) -> Result<T, CacheError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let conn = self.connection().await?;
        let error = match timeout(self.command_timeout, command(conn)).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) if !breaks_connection(&e) => return Err(e.into()),
            Ok(Err(e)) => CacheError::Redis(e),
            Err(_) => CacheError::Timeout(self.command_timeout),
        };

        warn!(error = %error, "dropping redis connection, next operation reconnects");
        *self.conn.lock().await = None;
        Err(error)
    }
}

/// Server replies (wrong type, script errors) leave the connection usable.
fn breaks_connection(error: &RedisError) -> bool {
    !matches!(error.kind(), ErrorKind::ResponseError | ErrorKind::TypeError)
}

#[async_trait]
impl CacheStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.run(|mut conn| async move { conn.get(key).await })
            .await
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<(), CacheError> {
        self.run(|mut conn| async move {
            match ttl {
                Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1)).await,
                None => conn.set::<_, _, ()>(key, value).await,
            }
        })
        .await
    }

    async fn delete(&self, keys: &[String]) -> Result<usize, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.run(|mut conn| async move { conn.del(keys).await })
            .await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut keys: Vec<String> = self
            .run(|mut conn| async move { conn.keys(pattern).await })
            .await?;
        keys.sort();
        Ok(keys)
    }
}
