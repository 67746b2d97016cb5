//! Local in-process token buckets.
//!
//! The single-instance counterpart of the distributed limiter, with the same
//! observable semantics. Used by tests and available as a strictly more
//! restrictive secondary gate in front of the shared store; never a
//! substitute for it across instances.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use async_trait::async_trait;

use crate::ratelimit::types::{LimitConfig, LimitDecision, LimitError, LimitKey, RateLimiter};

/// One in-memory bucket. Fractional tokens are kept so slow refill rates
/// (e.g. 100/hour) accrue smoothly instead of starving.
pub struct LocalBucket {
    state: Mutex<BucketState>,
    config: LimitConfig,
}

struct BucketState {
    tokens: f64,
    refilled_at: Instant,
}

impl LocalBucket {
    /// New bucket, initially full.
    pub fn new(config: LimitConfig) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: config.capacity as f64,
                refilled_at: Instant::now(),
            }),
            config,
        }
    }

    /// Refill from elapsed time, then consume `cost` tokens or deny.
    pub fn try_consume(&self, cost: f64) -> LimitDecision {
        let mut state = self.state.lock().expect("bucket lock poisoned");

        let now = Instant::now();
        let elapsed = now.duration_since(state.refilled_at).as_secs_f64();
        state.tokens =
            (state.tokens + elapsed * self.config.refill_rate).min(self.config.capacity as f64);
        state.refilled_at = now;

        let limit = self.config.requests_per_hour();
        if state.tokens >= cost {
            state.tokens -= cost;
            LimitDecision::Allowed {
                remaining: state.tokens,
                limit,
            }
        } else {
            let deficit = cost - state.tokens;
            let retry_after_ms = ((deficit / self.config.refill_rate) * 1_000.0).ceil() as u64;
            LimitDecision::Limited {
                retry_after_ms,
                limit,
                remaining: state.tokens,
            }
        }
    }

    /// Tokens currently available, after refill.
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock().expect("bucket lock poisoned");
        let now = Instant::now();
        let elapsed = now.duration_since(state.refilled_at).as_secs_f64();
        state.tokens =
            (state.tokens + elapsed * self.config.refill_rate).min(self.config.capacity as f64);
        state.refilled_at = now;
        state.tokens
    }

    /// Restore the bucket to full capacity.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("bucket lock poisoned");
        state.tokens = self.config.capacity as f64;
        state.refilled_at = Instant::now();
    }

    pub fn config(&self) -> &LimitConfig {
        &self.config
    }
}

/// Map of local buckets keyed by admission key. Implements the same trait as
/// the distributed limiter so the pipeline can run against either.
#[derive(Default)]
pub struct LocalLimiter {
    buckets: Mutex<HashMap<String, LocalBucket>>,
}

impl LocalLimiter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimiter for LocalLimiter {
    async fn check(
        &self,
        key: &LimitKey,
        config: &LimitConfig,
        cost: f64,
    ) -> Result<LimitDecision, LimitError> {
        let storage_key = key.storage_key();
        let mut buckets = self.buckets.lock().expect("limiter lock poisoned");
        let bucket = buckets
            .entry(storage_key)
            .or_insert_with(|| LocalBucket::new(*config));
        Ok(bucket.try_consume(cost))
    }
}
