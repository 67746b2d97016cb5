//! Prometheus metrics, registered once in the default registry and exposed
//! at `/metrics` in text format.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    /// Total HTTP requests by method and path.
    pub static ref HTTP_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "reflex_http_requests_total",
        "Total number of HTTP requests by method and path",
        &["method", "path"]
    )
    .unwrap();

    /// HTTP request duration by method, path and status.
    pub static ref HTTP_REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "reflex_http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path", "status"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    /// PII scan duration by configured pattern set.
    pub static ref PII_DETECTION_DURATION: HistogramVec = register_histogram_vec!(
        "reflex_pii_detection_duration_seconds",
        "Time spent on PII detection",
        &["pattern_set"],
        vec![0.0001, 0.0005, 0.001, 0.002, 0.005, 0.01, 0.025, 0.05, 0.1]
    )
    .unwrap();

    /// PII findings by kind.
    pub static ref PII_DETECTIONS: IntCounterVec = register_int_counter_vec!(
        "reflex_pii_detections_total",
        "Total number of PII detections by type",
        &["pii_type"]
    )
    .unwrap();

    /// Injection scan duration by configured mode.
    pub static ref INJECTION_DETECTION_DURATION: HistogramVec = register_histogram_vec!(
        "reflex_injection_detection_duration_seconds",
        "Time spent on injection detection",
        &["mode"],
        vec![0.0001, 0.0005, 0.001, 0.002, 0.005, 0.01, 0.025, 0.05, 0.1]
    )
    .unwrap();

    /// Injection findings by adjusted severity.
    pub static ref INJECTION_DETECTIONS: IntCounterVec = register_int_counter_vec!(
        "reflex_injection_detections_total",
        "Total number of injection detections by severity",
        &["severity"]
    )
    .unwrap();

    /// Verdict cache hits.
    pub static ref CACHE_HITS: IntCounter = register_int_counter!(
        "reflex_cache_hits_total",
        "Total number of cache hits"
    )
    .unwrap();

    /// Verdict cache misses (including recovered cache faults).
    pub static ref CACHE_MISSES: IntCounter = register_int_counter!(
        "reflex_cache_misses_total",
        "Total number of cache misses"
    )
    .unwrap();

    /// Cache operation duration by operation name.
    pub static ref CACHE_OPERATION_DURATION: HistogramVec = register_histogram_vec!(
        "reflex_cache_operation_duration_seconds",
        "Time spent on cache operations",
        &["operation"],
        vec![0.0001, 0.0005, 0.001, 0.002, 0.005, 0.01, 0.025, 0.05, 0.1]
    )
    .unwrap();

    /// Admission checks that passed.
    pub static ref RATE_LIMIT_ALLOWED: IntCounter = register_int_counter!(
        "reflex_rate_limit_allowed_total",
        "Total number of rate limit checks that passed"
    )
    .unwrap();

    /// Admission checks that rejected, by dimension.
    pub static ref RATE_LIMIT_REJECTED: IntCounterVec = register_int_counter_vec!(
        "reflex_rate_limit_rejected_total",
        "Total number of rate limit checks that rejected",
        &["dimension"]
    )
    .unwrap();

    /// Admission check duration by dimension.
    pub static ref RATE_LIMIT_DURATION: HistogramVec = register_histogram_vec!(
        "reflex_rate_limit_duration_seconds",
        "Time spent on rate limit checks",
        &["dimension"],
        vec![0.0001, 0.0005, 0.001, 0.002, 0.005, 0.01, 0.025, 0.05, 0.1]
    )
    .unwrap();

    /// Requests blocked on a critical injection finding.
    pub static ref REQUESTS_BLOCKED: IntCounter = register_int_counter!(
        "reflex_requests_blocked_total",
        "Total number of requests blocked due to critical injection"
    )
    .unwrap();
}

pub fn record_pii_scan(duration_secs: f64, pattern_set: &str) {
    PII_DETECTION_DURATION
        .with_label_values(&[pattern_set])
        .observe(duration_secs);
}

pub fn record_pii_match(pii_type: &str) {
    PII_DETECTIONS.with_label_values(&[pii_type]).inc();
}

pub fn record_injection_scan(duration_secs: f64, mode: &str) {
    INJECTION_DETECTION_DURATION
        .with_label_values(&[mode])
        .observe(duration_secs);
}

pub fn record_injection_match(severity: &str) {
    INJECTION_DETECTIONS.with_label_values(&[severity]).inc();
}

pub fn record_cache_hit() {
    CACHE_HITS.inc();
}

pub fn record_cache_miss() {
    CACHE_MISSES.inc();
}

pub fn record_cache_operation(operation: &str, duration_secs: f64) {
    CACHE_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration_secs);
}

pub fn record_rate_limit_allowed() {
    RATE_LIMIT_ALLOWED.inc();
}

pub fn record_rate_limit_rejected(dimension: &str) {
    RATE_LIMIT_REJECTED.with_label_values(&[dimension]).inc();
}

pub fn record_rate_limit_check(dimension: &str, duration_secs: f64) {
    RATE_LIMIT_DURATION
        .with_label_values(&[dimension])
        .observe(duration_secs);
}

pub fn record_request_blocked() {
    REQUESTS_BLOCKED.inc();
}

/// Render every registered series in Prometheus text exposition format.
pub fn render() -> String {
    let families = prometheus::gather();
    let mut out = String::new();
    if let Err(e) = TextEncoder::new().encode_utf8(&families, &mut out) {
        tracing::error!(error = %e, "failed to encode metrics");
    }
    out
}
