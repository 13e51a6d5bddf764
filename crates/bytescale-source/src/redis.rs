//! Redis-backed [`KeyValueSource`].
//!
//! Wraps a `redis::Client` and one lazily opened
//! [`MultiplexedConnection`]. Callers clone the multiplexed handle and
//! issue commands concurrently over the same socket; replies are matched
//! to requests by the connection's driver task, so a caller that gives up
//! mid-request never sees another caller's reply.
//!
//! ```text
//! get(key) ──► connection() ──► clone of cached MultiplexedConnection
//!                 │                    │
//!                 └─ none cached ──► Client::get_multiplexed_tokio_connection
//!                                      (SELECT db issued by the driver)
//! ```
//!
//! Transport failures and timeouts discard the cached connection so the
//! next read reconnects.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, RedisResult};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{SourceError, SourceResult};
use crate::kv::KeyValueSource;

/// Connection settings for [`RedisClient`].
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    /// Logical database selected after connecting.
    pub db: i64,
    /// Bound on connecting and on each command round-trip.
    pub timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 6379,
            db: 0,
            timeout: Duration::from_secs(2),
        }
    }
}

impl RedisConfig {
    /// `host:port` as used for logging.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connection URL understood by `redis::Client::open`.
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

/// Shared Redis reader over one multiplexed connection.
pub struct RedisClient {
    config: RedisConfig,
    client: Client,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisClient {
    /// Create a client. No connection is made until the first read.
    pub fn new(config: RedisConfig) -> SourceResult<Self> {
        let client = Client::open(config.url()).map_err(|e| SourceError::Connect {
            addr: config.address(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            config,
            client,
            conn: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Check connectivity with `PING`.
    pub async fn ping(&self) -> SourceResult<()> {
        let mut conn = self.connection().await?;
        let cmd = redis::cmd("PING");
        let pong: String = self.finish(cmd.query_async(&mut conn)).await?;
        if pong.eq_ignore_ascii_case("PONG") {
            Ok(())
        } else {
            Err(SourceError::Redis(format!("PING != PONG: {pong:?}")))
        }
    }

    /// The cached connection, opening one if needed.
    ///
    /// The lock only covers the connect; commands run on a clone.
    async fn connection(&self) -> SourceResult<MultiplexedConnection> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let addr = self.config.address();
        debug!(%addr, db = self.config.db, "connecting to redis");

        let conn = tokio::time::timeout(
            self.config.timeout,
            self.client.get_multiplexed_tokio_connection(),
        )
        .await
        .map_err(|_| SourceError::Timeout(self.config.timeout))?
        .map_err(|e| SourceError::Connect {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;

        info!(%addr, db = self.config.db, "connected to redis");
        *slot = Some(conn.clone());
        Ok(conn)
    }

    /// Await one command under the timeout, discarding the connection on
    /// transport failure.
    async fn finish<T>(
        &self,
        fut: impl Future<Output = RedisResult<T>>,
    ) -> SourceResult<T> {
        match tokio::time::timeout(self.config.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                if e.is_io_error() || e.is_connection_dropped() {
                    self.discard(&e.to_string()).await;
                }
                Err(SourceError::Redis(e.to_string()))
            }
            Err(_) => {
                self.discard("timed out").await;
                Err(SourceError::Timeout(self.config.timeout))
            }
        }
    }

    async fn discard(&self, reason: &str) {
        if self.conn.lock().await.take().is_some() {
            warn!(addr = %self.config.address(), %reason, "redis connection dropped");
        }
    }
}

#[async_trait]
impl KeyValueSource for RedisClient {
    async fn get(&self, key: &str) -> SourceResult<Option<String>> {
        debug!(%key, "getting key from redis");

        let mut conn = self.connection().await?;
        let value: Option<String> = self.finish(conn.get(key)).await?;

        match value {
            None => {
                debug!(%key, "key does not exist");
                Ok(None)
            }
            Some(value) if value.is_empty() => {
                debug!(%key, "empty value");
                Ok(None)
            }
            Some(value) => {
                debug!(%key, %value, "got value");
                Ok(Some(value))
            }
        }
    }
}
