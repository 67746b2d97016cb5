//! Cache abstractions: TTL classes, operation errors, statistics and the
//! backend trait shared by the Redis and in-memory implementations.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Time-to-live class for a cache entry.
///
/// Verdicts with detections use `Short` so pattern updates take effect
/// quickly; clean verdicts use `Medium` to amortize common benign traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CacheTtl {
    /// 60 seconds.
    Short,
    /// 300 seconds.
    #[default]
    Medium,
    /// 3600 seconds.
    Long,
    /// No automatic expiration.
    Persistent,
    /// Explicit TTL in seconds.
    Custom(u64),
}

impl CacheTtl {
    /// Seconds until expiry; `None` for persistent entries.
    pub fn as_seconds(&self) -> Option<u64> {
        match self {
            CacheTtl::Short => Some(60),
            CacheTtl::Medium => Some(300),
            CacheTtl::Long => Some(3_600),
            CacheTtl::Persistent => None,
            CacheTtl::Custom(secs) => Some(*secs),
        }
    }
}

/// Cache operation failures. All of them are recoverable from the pipeline's
/// point of view: a failed read is a miss, a failed write is skipped.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("key derivation error: {0}")]
    Key(String),

    #[error("invalid invalidation pattern: {0}")]
    InvalidPattern(String),
}

impl From<crate::error::GateError> for CacheError {
    fn from(err: crate::error::GateError) -> Self {
        match err {
            crate::error::GateError::Store(e) => CacheError::Store(e),
            other => CacheError::Pool(other.to_string()),
        }
    }
}

/// In-process cache counters. Shared across tasks; all fields are atomics.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub sets: AtomicU64,
    pub deletes: AtomicU64,
    pub errors: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Hit rate over all lookups so far, 0.0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed) as f64;
        let misses = self.misses.load(Ordering::Relaxed) as f64;
        let total = hits + misses;
        if total == 0.0 {
            0.0
        } else {
            hits / total
        }
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            hit_rate: self.hit_rate(),
        }
    }
}

/// Serializable snapshot of [`CacheStats`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
    pub hit_rate: f64,
}

/// Backend-agnostic cache operations.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Look up a raw value. `Ok(None)` is a miss.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value under the given TTL class.
    async fn set(&self, key: &str, value: &str, ttl: CacheTtl) -> Result<(), CacheError>;

    /// Remove a single key; removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Bulk-delete keys matching a glob pattern. The pattern must pass
    /// [`crate::cache::key::validate_invalidation_pattern`]; the walk is
    /// incremental and not atomic across keys. Returns the delete count.
    async fn invalidate_pattern(&self, pattern: &str) -> Result<u64, CacheError>;

    /// Counter snapshot source.
    fn stats(&self) -> &CacheStats;
}
