//! Redis-backed cache.
//!
//! All operations go through the shared pooled client. Pattern invalidation
//! walks the keyspace with cursor-based SCAN in batches, so it never blocks
//! the store the way KEYS would; the walk is explicitly not atomic.

use std::sync::Arc;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::cache::key::validate_invalidation_pattern;
use crate::cache::types::{Cache, CacheError, CacheStats, CacheTtl};
use crate::store::KvClient;

/// Keys fetched per SCAN round trip.
const SCAN_BATCH: usize = 256;

pub struct RedisCache {
    kv: Arc<KvClient>,
    stats: Arc<CacheStats>,
}

impl RedisCache {
    pub fn new(kv: Arc<KvClient>) -> Self {
        Self {
            kv,
            stats: Arc::new(CacheStats::new()),
        }
    }

    /// Shared handle to this cache's counters.
    pub fn stats_handle(&self) -> Arc<CacheStats> {
        Arc::clone(&self.stats)
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.kv.connection().await?;

        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(value)) => {
                self.stats.record_hit();
                debug!(key, "cache hit");
                Ok(Some(value))
            }
            Ok(None) => {
                self.stats.record_miss();
                debug!(key, "cache miss");
                Ok(None)
            }
            Err(e) => {
                self.stats.record_error();
                warn!(key, error = %e, "cache GET failed");
                Err(CacheError::Store(e))
            }
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: CacheTtl) -> Result<(), CacheError> {
        let mut conn = self.kv.connection().await?;

        let result = match ttl.as_seconds() {
            Some(seconds) => conn.set_ex::<_, _, ()>(key, value, seconds).await,
            None => conn.set::<_, _, ()>(key, value).await,
        };

        match result {
            Ok(()) => {
                self.stats.record_set();
                debug!(key, ?ttl, "cache set");
                Ok(())
            }
            Err(e) => {
                self.stats.record_error();
                warn!(key, error = %e, "cache SET failed");
                Err(CacheError::Store(e))
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.kv.connection().await?;

        match conn.del::<_, ()>(key).await {
            Ok(()) => {
                self.stats.record_delete();
                Ok(())
            }
            Err(e) => {
                self.stats.record_error();
                warn!(key, error = %e, "cache DELETE failed");
                Err(CacheError::Store(e))
            }
        }
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        validate_invalidation_pattern(pattern)?;

        let mut conn = self.kv.connection().await?;
        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut *conn)
                .await
                .map_err(|e| {
                    self.stats.record_error();
                    CacheError::Store(e)
                })?;

            if !keys.is_empty() {
                let removed: u64 = conn.del(&keys).await.map_err(|e| {
                    self.stats.record_error();
                    CacheError::Store(e)
                })?;
                for _ in 0..removed {
                    self.stats.record_delete();
                }
                deleted += removed;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        debug!(pattern, deleted, "pattern invalidation complete");
        Ok(deleted)
    }

    fn stats(&self) -> &CacheStats {
        &self.stats
    }
}
