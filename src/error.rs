//! Error taxonomy for the gate.
//!
//! Two layers: `GateError` covers everything that can go wrong internally,
//! `ApiError` is the subset a handler surfaces to a client. Only validation
//! and rate-limit messages derive from client input; every other kind is
//! reported generically with a request id for correlation.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Internal error type shared by all gate components.
#[derive(Error, Debug)]
pub enum GateError {
    /// Configuration could not be loaded or validated at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Shared KV store (Redis) connection or command failure.
    #[error("store error: {0}")]
    Store(#[from] redis::RedisError),

    /// Cache read/write failure; recovered locally as a miss.
    #[error("cache error: {0}")]
    Cache(String),

    /// KV failure while checking admission; callers must fail closed.
    #[error("rate limit store error: {0}")]
    LimitStore(String),

    /// A single detection pattern failed; contained, scan continues.
    #[error("detection error: {0}")]
    Detection(String),

    /// Client input rejected before any pipeline stage ran.
    #[error("validation error: {0}")]
    Validation(String),

    /// Per-request hard budget exhausted.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Anything else; surfaced as a sanitized 500.
    #[error("internal error: {0}")]
    Internal(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type GateResult<T> = Result<T, GateError>;

impl GateError {
    /// Whether this error warrants an ERROR-level log entry (vs WARN).
    pub fn is_severe(&self) -> bool {
        matches!(
            self,
            GateError::Config(_)
                | GateError::Store(_)
                | GateError::LimitStore(_)
                | GateError::Internal(_)
        )
    }
}

impl From<config::ConfigError> for GateError {
    fn from(err: config::ConfigError) -> Self {
        GateError::Config(err.to_string())
    }
}

impl From<std::io::Error> for GateError {
    fn from(err: std::io::Error) -> Self {
        GateError::Internal(format!("io error: {}", err))
    }
}

/// Wire shape of every non-200 response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// HTTP status code, duplicated into the body.
    pub code: u16,

    /// Client-safe message.
    pub message: String,

    /// Full error text; present only in debug builds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Request id for log correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    /// RFC3339 timestamp of the failure.
    pub timestamp: String,
}

impl ErrorBody {
    pub fn new(code: StatusCode, message: impl Into<String>, request_id: Option<String>) -> Self {
        Self {
            code: code.as_u16(),
            message: message.into(),
            detail: None,
            request_id,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        if cfg!(debug_assertions) {
            self.detail = Some(detail.into());
        }
        self
    }
}

/// Handler-facing error: the kinds a client can actually observe.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed or out-of-range input (400). Never charged against quota.
    #[error("validation error: {0}")]
    Validation(String),

    /// Uncontained fault (500). The message never reaches the client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Attach a request id so the error body can be correlated with logs.
    pub fn into_response_with_id(self, request_id: &str) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };

        match &self {
            ApiError::Validation(_) => {
                tracing::warn!(error = %self, request_id, "request rejected");
            }
            ApiError::Internal(_) => {
                tracing::error!(error = %self, request_id, "request failed");
            }
        }

        let body = ErrorBody::new(status, message, Some(request_id.to_string()))
            .with_detail(self.to_string());
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };

        let body = ErrorBody::new(status, message, None).with_detail(self.to_string());
        (status, Json(body)).into_response()
    }
}
