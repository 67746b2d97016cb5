//! Admission control types: tiers, bucket parameters, dimension keys and
//! check outcomes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Quota tier for a principal. Capacity is the burst allowance; the hourly
/// quota sets the refill rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Tier {
    /// 100 requests/hour, burst of 10.
    #[default]
    Free,
    /// 1,000 requests/hour, burst of 50.
    Basic,
    /// 10,000 requests/hour, burst of 100.
    Pro,
    /// 100,000 requests/hour, burst of 500.
    Enterprise,
    /// No admission checks at all.
    Unlimited,
}

impl Tier {
    /// Bucket parameters for this tier; `None` means the dimension is never
    /// checked (Unlimited short-circuits before touching the store).
    pub fn limit(&self) -> Option<LimitConfig> {
        match self {
            Tier::Free => Some(LimitConfig::per_hour(10, 100.0)),
            Tier::Basic => Some(LimitConfig::per_hour(50, 1_000.0)),
            Tier::Pro => Some(LimitConfig::per_hour(100, 10_000.0)),
            Tier::Enterprise => Some(LimitConfig::per_hour(500, 100_000.0)),
            Tier::Unlimited => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Basic => "basic",
            Tier::Pro => "pro",
            Tier::Enterprise => "enterprise",
            Tier::Unlimited => "unlimited",
        }
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "free" => Ok(Tier::Free),
            "basic" => Ok(Tier::Basic),
            "pro" => Ok(Tier::Pro),
            "enterprise" => Ok(Tier::Enterprise),
            "unlimited" => Ok(Tier::Unlimited),
            other => Err(format!("unknown rate limit tier: {}", other)),
        }
    }
}

/// Token bucket parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimitConfig {
    /// Maximum tokens the bucket holds (burst allowance).
    pub capacity: u64,
    /// Refill rate in tokens per second. Fractional rates are preserved end
    /// to end so sustained traffic below quota never starves.
    pub refill_rate: f64,
}

impl LimitConfig {
    /// Build from an hourly quota.
    pub fn per_hour(capacity: u64, requests_per_hour: f64) -> Self {
        Self {
            capacity,
            refill_rate: requests_per_hour / 3_600.0,
        }
    }

    /// Build from a per-minute quota.
    pub fn per_minute(capacity: u64, requests_per_minute: f64) -> Self {
        Self {
            capacity,
            refill_rate: requests_per_minute / 60.0,
        }
    }

    /// Hourly quota implied by the refill rate, rounded to whole requests.
    pub fn requests_per_hour(&self) -> u64 {
        (self.refill_rate * 3_600.0).round() as u64
    }
}

/// Admission dimension plus principal identity. One bucket per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LimitKey {
    User(String),
    Ip(String),
    Endpoint(String),
    Global,
    Custom(String),
}

impl LimitKey {
    /// Key under which the bucket state lives in the shared store.
    pub fn storage_key(&self) -> String {
        match self {
            LimitKey::User(id) => format!("reflex:ratelimit:user:{}", id),
            LimitKey::Ip(ip) => format!("reflex:ratelimit:ip:{}", ip),
            LimitKey::Endpoint(ep) => format!("reflex:ratelimit:endpoint:{}", ep),
            LimitKey::Global => "reflex:ratelimit:global".to_string(),
            LimitKey::Custom(name) => format!("reflex:ratelimit:custom:{}", name),
        }
    }

    /// Dimension label used on metrics.
    pub fn dimension(&self) -> &'static str {
        match self {
            LimitKey::User(_) => "user",
            LimitKey::Ip(_) => "ip",
            LimitKey::Endpoint(_) => "endpoint",
            LimitKey::Global => "global",
            LimitKey::Custom(_) => "custom",
        }
    }
}

/// Outcome of one admission check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LimitDecision {
    Allowed {
        /// Tokens left in the bucket after this consumption.
        remaining: f64,
        /// Hourly quota backing the bucket, for response headers.
        limit: u64,
    },
    Limited {
        /// How long until enough tokens accrue for the denied cost.
        retry_after_ms: u64,
        /// Hourly quota backing the bucket.
        limit: u64,
        /// Tokens currently in the bucket (fractional).
        remaining: f64,
    },
}

impl LimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, LimitDecision::Allowed { .. })
    }

    pub fn is_limited(&self) -> bool {
        matches!(self, LimitDecision::Limited { .. })
    }
}

/// Admission check failures. In the admission path every one of these must
/// be treated as a denial: an unreachable store is not a license to admit.
#[derive(Error, Debug)]
pub enum LimitError {
    #[error("store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("script error: {0}")]
    Script(String),

    #[error("pool error: {0}")]
    Pool(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<crate::error::GateError> for LimitError {
    fn from(err: crate::error::GateError) -> Self {
        match err {
            crate::error::GateError::Store(e) => LimitError::Store(e),
            other => LimitError::Pool(other.to_string()),
        }
    }
}

/// Backend-agnostic admission check.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Atomically consume `cost` tokens from the bucket for `key`, refilling
    /// first. Concurrent checks on one key are linearizable.
    async fn check(
        &self,
        key: &LimitKey,
        config: &LimitConfig,
        cost: f64,
    ) -> Result<LimitDecision, LimitError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_parameters() {
        let free = Tier::Free.limit().unwrap();
        assert_eq!(free.capacity, 10);
        assert!((free.refill_rate - 100.0 / 3_600.0).abs() < 1e-9);
        assert_eq!(free.requests_per_hour(), 100);

        let enterprise = Tier::Enterprise.limit().unwrap();
        assert_eq!(enterprise.capacity, 500);
        assert_eq!(enterprise.requests_per_hour(), 100_000);

        assert!(Tier::Unlimited.limit().is_none());
    }

    #[test]
    fn tier_parsing() {
        assert_eq!("free".parse::<Tier>().unwrap(), Tier::Free);
        assert_eq!("Basic".parse::<Tier>().unwrap(), Tier::Basic);
        assert_eq!("PRO".parse::<Tier>().unwrap(), Tier::Pro);
        assert_eq!("enterprise".parse::<Tier>().unwrap(), Tier::Enterprise);
        assert_eq!("unlimited".parse::<Tier>().unwrap(), Tier::Unlimited);
        assert!("platinum".parse::<Tier>().is_err());
    }

    #[test]
    fn config_conversions() {
        let config = LimitConfig::per_minute(30, 120.0);
        assert!((config.refill_rate - 2.0).abs() < 1e-9);
        assert_eq!(config.requests_per_hour(), 7_200);
    }

    #[test]
    fn storage_keys_and_dimensions() {
        assert_eq!(
            LimitKey::User("u1".into()).storage_key(),
            "reflex:ratelimit:user:u1"
        );
        assert_eq!(
            LimitKey::Ip("10.0.0.1".into()).storage_key(),
            "reflex:ratelimit:ip:10.0.0.1"
        );
        assert_eq!(LimitKey::Global.storage_key(), "reflex:ratelimit:global");
        assert_eq!(LimitKey::Ip("x".into()).dimension(), "ip");
        assert_eq!(LimitKey::Endpoint("/process".into()).dimension(), "endpoint");
        assert_eq!(LimitKey::Custom("burst".into()).dimension(), "custom");
    }

    #[test]
    fn decision_predicates() {
        let allowed = LimitDecision::Allowed {
            remaining: 9.0,
            limit: 100,
        };
        assert!(allowed.is_allowed());
        assert!(!allowed.is_limited());

        let limited = LimitDecision::Limited {
            retry_after_ms: 36_000,
            limit: 100,
            remaining: 0.2,
        };
        assert!(limited.is_limited());
    }
}
