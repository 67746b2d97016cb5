//! Request handlers.
//!
//! `process` runs the full pipeline in its fixed stage order: validate,
//! admit, cache lookup, PII scan, injection scan, decide, cache store,
//! respond. Admission faults fail closed; cache faults degrade to misses.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::cache::{verdict_key, CacheTtl};
use crate::error::{ApiError, ErrorBody};
use crate::http::middleware::RequestId;
use crate::http::AppState;
use crate::injection::has_critical;
use crate::metrics;
use crate::ratelimit::{LimitDecision, LimitKey, Tier};
use crate::verdict::{Verdict, VerdictStatus};

/// Upper bound on analyzed text, in characters.
pub const MAX_TEXT_CHARS: usize = 100_000;

/// `POST /process` payload. Unknown fields are rejected: the schema is a
/// closed contract, not a bag of hints.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessRequest {
    /// Text to analyze.
    pub text: String,

    /// Principal for the user admission dimension.
    #[serde(default)]
    pub user_id: Option<String>,

    /// Run the PII stage (default true).
    #[serde(default = "default_true")]
    pub check_pii: bool,

    /// Run the injection stage (default true).
    #[serde(default = "default_true")]
    pub check_injection: bool,

    /// Consult and update the verdict cache (default true).
    #[serde(default = "default_true")]
    pub use_cache: bool,
}

fn default_true() -> bool {
    true
}

/// `GET /health` body.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// `GET /ready` body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub ready: bool,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessChecks {
    pub kv: bool,
}

/// Outcome of one admission dimension that denied (or failed closed).
struct Denial {
    dimension: &'static str,
    retry_after_ms: u64,
    limit: u64,
    remaining: f64,
}

/// Main pipeline entry point.
pub async fn process(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> Response {
    let started = Instant::now();

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return ApiError::Validation(format!("malformed request body: {}", rejection))
                .into_response_with_id(&request_id);
        }
    };

    // Stage 1: validate. Rejected input never reaches admission control, so
    // it is never charged against a quota.
    let text_chars = request.text.chars().count();
    if text_chars == 0 {
        return ApiError::Validation("text cannot be empty".into())
            .into_response_with_id(&request_id);
    }
    if text_chars > MAX_TEXT_CHARS {
        return ApiError::Validation(format!(
            "text exceeds the maximum length of {} characters",
            MAX_TEXT_CHARS
        ))
        .into_response_with_id(&request_id);
    }

    // Stages 2-8 run under the per-request hard budget.
    let budget = state.settings.request_timeout();
    match tokio::time::timeout(budget, run_pipeline(&state, &request, &request_id, addr, started))
        .await
    {
        Ok(response) => response,
        Err(_) => {
            error!(%request_id, budget_ms = budget.as_millis() as u64, "request budget exhausted");
            let body = ErrorBody::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "request timed out",
                Some(request_id),
            );
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

async fn run_pipeline(
    state: &AppState,
    request: &ProcessRequest,
    request_id: &str,
    addr: SocketAddr,
    started: Instant,
) -> Response {
    // Stage 2: admission, IP dimension first, then user when present.
    // Either denial short-circuits the rest of the pipeline.
    let ip_key = LimitKey::Ip(addr.ip().to_string());
    if let Some(denial) = admit(state, &ip_key, state.ip_tier).await {
        return rate_limited_response(request_id, started, denial);
    }

    if let Some(user_id) = &request.user_id {
        let user_key = LimitKey::User(user_id.clone());
        if let Some(denial) = admit(state, &user_key, state.user_tier).await {
            return rate_limited_response(request_id, started, denial);
        }
    }

    // Stage 3: cache lookup.
    let cache_key = if request.use_cache {
        match verdict_key(&state.cache_revision, &request.text) {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(request_id, error = %e, "cache key derivation failed");
                None
            }
        }
    } else {
        None
    };

    if let Some(key) = &cache_key {
        if let Some(verdict) = cache_lookup(state, key, request_id, started).await {
            return (StatusCode::OK, Json(verdict)).into_response();
        }
    }

    // Stage 4: PII scan on the original text.
    let pii_matches = if request.check_pii {
        let scan_started = Instant::now();
        let matches = state.pii.scan(&request.text);
        metrics::record_pii_scan(
            scan_started.elapsed().as_secs_f64(),
            state.pii.config().pattern_set.label(),
        );
        for m in &matches {
            metrics::record_pii_match(&m.kind.to_string());
        }
        debug!(request_id, count = matches.len(), "PII scan complete");
        matches
    } else {
        Vec::new()
    };

    // Stage 5: injection scan on the original text.
    let injection_matches = if request.check_injection {
        let scan_started = Instant::now();
        let matches = state.injection.scan(&request.text);
        metrics::record_injection_scan(
            scan_started.elapsed().as_secs_f64(),
            state.injection.config().mode.label(),
        );
        for m in &matches {
            metrics::record_injection_match(m.severity.label());
        }
        debug!(request_id, count = matches.len(), "injection scan complete");
        matches
    } else {
        Vec::new()
    };

    // Stage 6: decide. Blocking requires Critical severity surviving context
    // adjustment.
    let status = if has_critical(&injection_matches) {
        metrics::record_request_blocked();
        warn!(request_id, "blocking request on critical injection finding");
        VerdictStatus::Blocked
    } else {
        VerdictStatus::Success
    };

    let verdict = Verdict {
        request_id: request_id.to_string(),
        status,
        pii_matches,
        injection_matches,
        cache_hit: false,
        processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
    };

    // Stage 7: cache store. Failures are logged and absorbed.
    if let Some(key) = &cache_key {
        cache_store(state, key, &verdict).await;
    }

    (StatusCode::OK, Json(verdict)).into_response()
}

/// Check one admission dimension. `None` means admitted. A store failure is
/// a denial: the shared KV is part of the trust base, so its absence cannot
/// become an open gate.
async fn admit(state: &AppState, key: &LimitKey, tier: Tier) -> Option<Denial> {
    let config = tier.limit()?;
    let dimension = key.dimension();

    let check_started = Instant::now();
    let decision = state.limiter.check(key, &config, 1.0).await;
    metrics::record_rate_limit_check(dimension, check_started.elapsed().as_secs_f64());

    match decision {
        Ok(LimitDecision::Allowed { .. }) => {
            metrics::record_rate_limit_allowed();
            None
        }
        Ok(LimitDecision::Limited {
            retry_after_ms,
            limit,
            remaining,
        }) => {
            metrics::record_rate_limit_rejected(dimension);
            debug!(dimension, retry_after_ms, "admission denied");
            Some(Denial {
                dimension,
                retry_after_ms,
                limit,
                remaining,
            })
        }
        Err(e) => {
            metrics::record_rate_limit_rejected(dimension);
            error!(dimension, error = %e, "admission store failure, failing closed");
            Some(Denial {
                dimension,
                retry_after_ms: 1_000,
                limit: config.requests_per_hour(),
                remaining: 0.0,
            })
        }
    }
}

/// 429 with the standard quota headers and a RateLimited verdict body.
fn rate_limited_response(request_id: &str, started: Instant, denial: Denial) -> Response {
    let retry_after_secs = denial.retry_after_ms.div_ceil(1_000).max(1);
    let reset_epoch = Utc::now().timestamp() + retry_after_secs as i64;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::RETRY_AFTER,
        header_value(retry_after_secs.to_string()),
    );
    headers.insert("X-RateLimit-Limit", header_value(denial.limit.to_string()));
    headers.insert(
        "X-RateLimit-Remaining",
        header_value((denial.remaining.floor().max(0.0) as u64).to_string()),
    );
    headers.insert("X-RateLimit-Reset", header_value(reset_epoch.to_string()));

    warn!(
        request_id,
        dimension = denial.dimension,
        retry_after_secs,
        "request rate limited"
    );

    let verdict = Verdict {
        request_id: request_id.to_string(),
        status: VerdictStatus::RateLimited,
        pii_matches: Vec::new(),
        injection_matches: Vec::new(),
        cache_hit: false,
        processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
    };

    (StatusCode::TOO_MANY_REQUESTS, headers, Json(verdict)).into_response()
}

fn header_value(value: String) -> HeaderValue {
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("0"))
}

/// Cache read with the miss-on-fault policy. A hit that fails to deserialize
/// is deleted and reported as a miss so a poisoned entry cannot wedge a key
/// until its TTL expires.
async fn cache_lookup(
    state: &AppState,
    key: &str,
    request_id: &str,
    started: Instant,
) -> Option<Verdict> {
    let op_started = Instant::now();
    let fetched = state.cache.get(key).await;
    metrics::record_cache_operation("get", op_started.elapsed().as_secs_f64());

    match fetched {
        Ok(Some(raw)) => match serde_json::from_str::<Verdict>(&raw) {
            Ok(mut verdict) => {
                metrics::record_cache_hit();
                debug!(request_id, key, "verdict served from cache");
                verdict.cache_hit = true;
                verdict.request_id = request_id.to_string();
                verdict.processing_time_ms = started.elapsed().as_secs_f64() * 1000.0;
                Some(verdict)
            }
            Err(e) => {
                warn!(request_id, key, error = %e, "malformed cached verdict, deleting");
                if let Err(e) = state.cache.delete(key).await {
                    warn!(key, error = %e, "failed to delete malformed entry");
                }
                metrics::record_cache_miss();
                None
            }
        },
        Ok(None) => {
            metrics::record_cache_miss();
            None
        }
        Err(e) => {
            // Store trouble in the cache path is recoverable: fall through
            // as a miss and let detection run.
            warn!(request_id, key, error = %e, "cache read failed, treating as miss");
            metrics::record_cache_miss();
            None
        }
    }
}

/// Cache write with the differential TTL rule.
async fn cache_store(state: &AppState, key: &str, verdict: &Verdict) {
    let ttl = if verdict.has_detections() {
        CacheTtl::Short
    } else {
        CacheTtl::Medium
    };

    let serialized = match serde_json::to_string(verdict) {
        Ok(s) => s,
        Err(e) => {
            warn!(key, error = %e, "verdict serialization failed, skipping cache");
            return;
        }
    };

    let op_started = Instant::now();
    if let Err(e) = state.cache.set(key, &serialized, ttl).await {
        warn!(key, error = %e, "cache write failed");
    }
    metrics::record_cache_operation("set", op_started.elapsed().as_secs_f64());
}

/// Liveness: always 200 while the process runs.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    };
    (StatusCode::OK, Json(response))
}

/// Readiness: 200 only when the shared KV answers its probe.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let kv_ready = match state.kv.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "KV readiness probe failed");
            false
        }
    };

    let response = ReadinessResponse {
        status: if kv_ready { "ready" } else { "not_ready" }.to_string(),
        ready: kv_ready,
        checks: ReadinessChecks { kv: kv_ready },
    };

    let status = if kv_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

/// Prometheus text exposition.
pub async fn metrics_endpoint() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render(),
    )
}
