//! Environment-backed configuration.
//!
//! The recognized option set is closed (see the deployment docs); there is no
//! runtime schema introspection. Every option has a default, enum-valued
//! options parse case-insensitively, and an invalid value fails startup
//! rather than being silently replaced.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{GateError, GateResult};
use crate::injection::{DetectionMode, InjectionConfig, Severity};
use crate::pii::{PatternSet, PiiConfig};
use crate::ratelimit::Tier;

/// Raw settings as read from the environment. String-typed fields are parsed
/// into their enum forms by the typed accessors below.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Bind host.
    pub host: String,

    /// Bind port.
    pub port: u16,

    /// Connection string for the shared KV store.
    pub kv_url: String,

    /// Upper bound on pooled KV connections.
    pub kv_pool_max: usize,

    /// Log verbosity (trace/debug/info/warn/error).
    pub log_level: String,

    /// Log output format (json or pretty).
    pub log_format: String,

    /// PII pattern set: Strict, Standard or Relaxed.
    pub pii_pattern_set: String,

    /// Injection detection mode: Strict, Standard or Relaxed.
    pub injection_mode: String,

    /// Minimum adjusted severity an injection match must keep to be reported.
    pub injection_severity_threshold: String,

    /// Tier applied to the IP dimension when no identity is known.
    pub rate_limit_default_ip_tier: String,

    /// Tier applied to the user dimension.
    pub rate_limit_default_user_tier: String,

    /// Hard cap on the request body, in bytes.
    pub request_body_max_bytes: usize,

    /// Per-request hard budget, in milliseconds.
    pub request_timeout_ms: u64,
}

impl Settings {
    /// Load settings from the environment, applying defaults for anything
    /// unset, then validate every enum-valued option.
    pub fn from_env() -> GateResult<Self> {
        let settings: Settings = config::Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8080)?
            .set_default("kv_url", "redis://localhost:6379")?
            .set_default("kv_pool_max", 16)?
            .set_default("log_level", "info")?
            .set_default("log_format", "json")?
            .set_default("pii_pattern_set", "Standard")?
            .set_default("injection_mode", "Standard")?
            .set_default("injection_severity_threshold", "Medium")?
            .set_default("rate_limit_default_ip_tier", "Free")?
            .set_default("rate_limit_default_user_tier", "Basic")?
            .set_default("request_body_max_bytes", 100_000)?
            .set_default("request_timeout_ms", 60_000)?
            .add_source(config::Environment::default())
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject invalid enum values up front so misconfiguration is a startup
    /// failure, not a per-request surprise.
    pub fn validate(&self) -> GateResult<()> {
        self.pattern_set()?;
        self.detection_mode()?;
        self.severity_threshold()?;
        self.ip_tier()?;
        self.user_tier()?;
        if self.request_body_max_bytes == 0 {
            return Err(GateError::Config(
                "request_body_max_bytes must be positive".into(),
            ));
        }
        if self.request_timeout_ms == 0 {
            return Err(GateError::Config(
                "request_timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn pattern_set(&self) -> GateResult<PatternSet> {
        self.pii_pattern_set
            .parse()
            .map_err(|e: String| GateError::Config(e))
    }

    pub fn detection_mode(&self) -> GateResult<DetectionMode> {
        self.injection_mode
            .parse()
            .map_err(|e: String| GateError::Config(e))
    }

    pub fn severity_threshold(&self) -> GateResult<Severity> {
        self.injection_severity_threshold
            .parse()
            .map_err(|e: String| GateError::Config(e))
    }

    pub fn ip_tier(&self) -> GateResult<Tier> {
        self.rate_limit_default_ip_tier
            .parse()
            .map_err(|e: String| GateError::Config(e))
    }

    pub fn user_tier(&self) -> GateResult<Tier> {
        self.rate_limit_default_user_tier
            .parse()
            .map_err(|e: String| GateError::Config(e))
    }

    /// PII engine configuration derived from these settings.
    pub fn pii_config(&self) -> GateResult<PiiConfig> {
        Ok(PiiConfig {
            pattern_set: self.pattern_set()?,
            enable_validation: true,
            enable_context: false,
        })
    }

    /// Injection engine configuration derived from these settings.
    pub fn injection_config(&self) -> GateResult<InjectionConfig> {
        Ok(InjectionConfig {
            mode: self.detection_mode()?,
            enable_context_analysis: true,
            enable_entropy_check: true,
            severity_threshold: self.severity_threshold()?,
            ..InjectionConfig::default()
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            kv_url: "redis://localhost:6379".into(),
            kv_pool_max: 16,
            log_level: "info".into(),
            log_format: "json".into(),
            pii_pattern_set: "Standard".into(),
            injection_mode: "Standard".into(),
            injection_severity_threshold: "Medium".into(),
            rate_limit_default_ip_tier: "Free".into(),
            rate_limit_default_user_tier: "Basic".into(),
            request_body_max_bytes: 100_000,
            request_timeout_ms: 60_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.bind_address(), "0.0.0.0:8080");
        assert_eq!(settings.request_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn enum_accessors_parse_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.pattern_set().unwrap(), PatternSet::Standard);
        assert_eq!(settings.detection_mode().unwrap(), DetectionMode::Standard);
        assert_eq!(settings.severity_threshold().unwrap(), Severity::Medium);
        assert_eq!(settings.ip_tier().unwrap(), Tier::Free);
        assert_eq!(settings.user_tier().unwrap(), Tier::Basic);
    }

    #[test]
    fn enum_parsing_is_case_insensitive() {
        let settings = Settings {
            pii_pattern_set: "relaxed".into(),
            injection_mode: "STRICT".into(),
            injection_severity_threshold: "low".into(),
            rate_limit_default_ip_tier: "enterprise".into(),
            ..Settings::default()
        };
        assert_eq!(settings.pattern_set().unwrap(), PatternSet::Relaxed);
        assert_eq!(settings.detection_mode().unwrap(), DetectionMode::Strict);
        assert_eq!(settings.severity_threshold().unwrap(), Severity::Low);
        assert_eq!(settings.ip_tier().unwrap(), Tier::Enterprise);
    }

    #[test]
    fn invalid_enum_value_fails_validation() {
        let settings = Settings {
            pii_pattern_set: "paranoid".into(),
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(GateError::Config(_))));
    }

    #[test]
    fn zero_limits_rejected() {
        let settings = Settings {
            request_body_max_bytes: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            request_timeout_ms: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn derived_engine_configs() {
        let settings = Settings::default();
        let pii = settings.pii_config().unwrap();
        assert_eq!(pii.pattern_set, PatternSet::Standard);
        assert!(pii.enable_validation);

        let injection = settings.injection_config().unwrap();
        assert_eq!(injection.mode, DetectionMode::Standard);
        assert_eq!(injection.severity_threshold, Severity::Medium);
        assert!(injection.enable_context_analysis);
    }
}
