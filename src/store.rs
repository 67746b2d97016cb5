//! Shared KV store client.
//!
//! Wraps a deadpool-redis pool with bounded retry on checkout and a PING
//! health probe. The cache and the rate limiter share one client; the pool
//! is the only mutable state and it manages its own locking.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Connection, Pool, Runtime};
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::error::{GateError, GateResult};

/// How long a caller may wait for a pooled connection.
const POOL_WAIT: Duration = Duration::from_millis(1_000);

/// Checkout retries before giving up on the pool.
const MAX_CHECKOUT_RETRIES: u32 = 3;

/// Budget for the readiness PING round trip.
const PING_BUDGET: Duration = Duration::from_millis(500);

/// Anything that can answer a liveness probe against the shared store.
#[async_trait]
pub trait KvHealth: Send + Sync {
    /// Resolve Ok when the store answers within the probe budget.
    async fn ping(&self) -> GateResult<()>;
}

/// Pooled client for the shared KV store.
#[derive(Clone)]
pub struct KvClient {
    pool: Pool,
    url: String,
}

impl KvClient {
    /// Build a client with a bounded connection pool.
    pub fn new(url: &str, pool_max: usize) -> GateResult<Self> {
        debug!(pool_max, "creating KV connection pool");

        let pool_config = PoolConfig {
            url: Some(url.to_string()),
            pool: Some(deadpool_redis::PoolConfig {
                max_size: pool_max,
                timeouts: deadpool_redis::Timeouts {
                    wait: Some(POOL_WAIT),
                    create: Some(POOL_WAIT),
                    recycle: Some(POOL_WAIT),
                },
                queue_mode: deadpool::managed::QueueMode::Fifo,
            }),
            connection: None,
        };

        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| GateError::Config(format!("failed to create KV pool: {:?}", e)))?;

        Ok(Self {
            pool,
            url: url.to_string(),
        })
    }

    /// Check out a connection, retrying with exponential backoff. Retries are
    /// bounded so an outage turns into an error the caller can map to its
    /// failure policy (miss for the cache, fail-closed for admission).
    pub async fn connection(&self) -> GateResult<Connection> {
        let mut attempt = 0;
        let mut backoff_ms = 50;

        loop {
            match self.pool.get().await {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    attempt += 1;
                    if attempt >= MAX_CHECKOUT_RETRIES {
                        error!(attempts = attempt, error = %e, "KV pool checkout failed");
                        return Err(GateError::Store(redis::RedisError::from((
                            redis::ErrorKind::IoError,
                            "connection pool exhausted",
                        ))));
                    }
                    warn!(
                        attempt,
                        backoff_ms,
                        error = %e,
                        "KV pool checkout failed, retrying"
                    );
                    sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = (backoff_ms * 2).min(1_000);
                }
            }
        }
    }

    /// Pool occupancy, exposed for readiness diagnostics.
    pub fn pool_status(&self) -> PoolStatus {
        let status = self.pool.status();
        PoolStatus {
            size: status.size,
            available: status.available,
            max_size: status.max_size,
        }
    }

    /// Connection string this client was built with.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl KvHealth for KvClient {
    async fn ping(&self) -> GateResult<()> {
        let fut = async {
            let mut conn = self.connection().await?;
            let reply: String = redis::cmd("PING")
                .query_async(&mut *conn)
                .await
                .map_err(GateError::Store)?;
            if reply == "PONG" {
                Ok(())
            } else {
                Err(GateError::Store(redis::RedisError::from((
                    redis::ErrorKind::ResponseError,
                    "unexpected PING reply",
                ))))
            }
        };

        match tokio::time::timeout(PING_BUDGET, fut).await {
            Ok(result) => result,
            Err(_) => Err(GateError::Timeout("KV PING exceeded budget".into())),
        }
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone)]
pub struct PoolStatus {
    pub size: usize,
    pub available: usize,
    pub max_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation_succeeds_without_server() {
        // Pool construction is lazy; no live server is needed here.
        let client = KvClient::new("redis://localhost:6379", 8);
        assert!(client.is_ok());

        let client = client.unwrap();
        assert_eq!(client.url(), "redis://localhost:6379");
        assert_eq!(client.pool_status().max_size, 8);
    }

    #[tokio::test]
    #[ignore] // Requires a running Redis.
    async fn ping_round_trip() {
        let client = KvClient::new("redis://localhost:6379", 4).unwrap();
        assert!(client.ping().await.is_ok());
    }
}
