//! HTTP surface: shared state, router assembly and middleware stack.

pub mod handlers;
pub mod middleware;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::cache::{engine_revision, Cache};
use crate::config::Settings;
use crate::error::GateResult;
use crate::injection::InjectionDetector;
use crate::pii::PiiDetector;
use crate::ratelimit::{RateLimiter, Tier};
use crate::store::KvHealth;

/// Shared application state. Detectors and configuration are immutable after
/// startup; the cache and limiter manage their own interior state.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub cache: Arc<dyn Cache>,
    pub limiter: Arc<dyn RateLimiter>,
    pub kv: Arc<dyn KvHealth>,
    pub pii: Arc<PiiDetector>,
    pub injection: Arc<InjectionDetector>,
    /// Engine revision token baked into every cache key.
    pub cache_revision: Arc<String>,
    pub ip_tier: Tier,
    pub user_tier: Tier,
    pub started_at: Instant,
}

impl AppState {
    /// Assemble state from validated settings and backends. Fails if any
    /// enum-valued option does not parse, so a bad deployment never serves.
    pub fn build(
        settings: Settings,
        cache: Arc<dyn Cache>,
        limiter: Arc<dyn RateLimiter>,
        kv: Arc<dyn KvHealth>,
    ) -> GateResult<Self> {
        let pattern_set = settings.pattern_set()?;
        let mode = settings.detection_mode()?;

        let pii = PiiDetector::new(settings.pii_config()?);
        let injection = InjectionDetector::new(settings.injection_config()?);
        let cache_revision = engine_revision(pattern_set, mode);
        let ip_tier = settings.ip_tier()?;
        let user_tier = settings.user_tier()?;

        Ok(Self {
            settings: Arc::new(settings),
            cache,
            limiter,
            kv,
            pii: Arc::new(pii),
            injection: Arc::new(injection),
            cache_revision: Arc::new(cache_revision),
            ip_tier,
            user_tier,
            started_at: Instant::now(),
        })
    }
}

/// Build the router with the full middleware stack.
pub fn router(state: AppState) -> Router {
    let body_limit = state.settings.request_body_max_bytes;

    Router::new()
        .route("/process", post(handlers::process))
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/metrics", get(handlers::metrics_endpoint))
        .layer(axum_middleware::from_fn(middleware::http_metrics))
        .layer(axum_middleware::from_fn(middleware::request_log))
        .layer(axum_middleware::from_fn(middleware::request_id))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        )
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
