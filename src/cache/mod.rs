//! Verdict cache.
//!
//! Keyed, idempotent storage for verdicts with tiered TTLs and guarded
//! pattern invalidation. Same input, same configuration, same verdict; the
//! cache is a pure optimization and every fault in it degrades to a miss.

pub mod key;
pub mod memory;
pub mod redis;
pub mod types;

pub use key::{
    engine_revision, fast_key, normalize, validate_invalidation_pattern, verdict_key,
    PATTERN_TABLE_REVISION, VERDICT_NAMESPACE,
};
pub use memory::MemoryCache;
pub use redis::RedisCache;
pub use types::{Cache, CacheError, CacheStats, CacheStatsSnapshot, CacheTtl};
