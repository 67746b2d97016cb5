//! Request-scoped middleware: request ids, per-request logging, HTTP metrics.

use axum::{
    extract::Request,
    http::header::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use uuid::Uuid;

use crate::metrics;

/// Header carrying the request id in both directions.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Longest client-supplied id we will preserve.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Request id attached to the request extensions for handlers and logs.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// A client id is preserved only when it is short, ASCII and free of
/// header-hostile characters; anything else is replaced wholesale.
fn is_well_formed(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_REQUEST_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

/// Attach a request id: the client's `X-Request-ID` when well-formed, a
/// fresh UUID otherwise. Echoed on the response.
pub async fn request_id(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|id| is_well_formed(id))
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Log start and completion of every request with its id.
pub async fn request_log(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_else(|| "unknown".to_string());

    tracing::debug!(request_id = %request_id, method = %method, uri = %uri, "request started");

    let response = next.run(request).await;

    tracing::info!(
        request_id = %request_id,
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = %started.elapsed().as_millis(),
        "request completed"
    );

    response
}

/// Count requests and record the latency histogram.
pub async fn http_metrics(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    metrics::HTTP_REQUESTS
        .with_label_values(&[method.as_str(), &path])
        .inc();

    let response = next.run(request).await;

    metrics::HTTP_REQUEST_DURATION
        .with_label_values(&[method.as_str(), &path, response.status().as_str()])
        .observe(started.elapsed().as_secs_f64());

    response
}
