//! Reflex Gate
//!
//! Preprocessing gate in front of an LLM orchestrator. For each request it
//! decides, in order, whether to deny admission, replay a cached verdict, or
//! scan for PII and prompt injection and decide fresh. The library exposes
//! every engine so the server binary and the test suites drive the same
//! code.

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod injection;
pub mod metrics;
pub mod pii;
pub mod ratelimit;
pub mod store;
pub mod verdict;

pub use cache::{Cache, CacheError, CacheStats, CacheTtl, MemoryCache, RedisCache};
pub use config::Settings;
pub use error::{ApiError, ErrorBody, GateError, GateResult};
pub use injection::{
    DetectionMode, InjectionConfig, InjectionDetector, InjectionKind, InjectionMatch, Severity,
};
pub use pii::{PatternSet, PiiConfig, PiiDetector, PiiKind, PiiMatch, RedactionStrategy};
pub use ratelimit::{
    DistributedLimiter, LimitConfig, LimitDecision, LimitError, LimitKey, LocalBucket,
    LocalLimiter, RateLimiter, Tier,
};
pub use store::{KvClient, KvHealth};
pub use verdict::{Verdict, VerdictStatus};
