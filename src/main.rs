//! Reflex Gate server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing::Level;

use reflex_gate::cache::RedisCache;
use reflex_gate::config::Settings;
use reflex_gate::http::{router, AppState};
use reflex_gate::ratelimit::DistributedLimiter;
use reflex_gate::store::{KvClient, KvHealth};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let settings = Settings::from_env()?;
    init_tracing(&settings.log_level, &settings.log_format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind = %settings.bind_address(),
        pattern_set = %settings.pii_pattern_set,
        injection_mode = %settings.injection_mode,
        "starting reflex gate"
    );

    let kv = Arc::new(KvClient::new(&settings.kv_url, settings.kv_pool_max)?);

    // Surface store trouble immediately, but keep serving: /ready reports the
    // live state, admission fails closed, the cache degrades to misses.
    match kv.ping().await {
        Ok(()) => tracing::info!("KV store reachable"),
        Err(e) => tracing::warn!(error = %e, "KV store unreachable at startup"),
    }

    let cache = Arc::new(RedisCache::new(Arc::clone(&kv)));
    let limiter = Arc::new(DistributedLimiter::new(Arc::clone(&kv)));

    let bind_address = settings.bind_address();
    let state = AppState::build(settings, cache, limiter, kv)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {}", bind_address))?;

    tracing::info!(addr = %bind_address, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    tracing::info!("shutdown complete");
    Ok(())
}

fn init_tracing(level: &str, format: &str) {
    let subscriber = tracing_subscriber::fmt()
        .with_target(true)
        .with_max_level(parse_level(level));

    match format.to_ascii_lowercase().as_str() {
        "json" => subscriber.json().init(),
        _ => subscriber.init(),
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Wait for SIGTERM (container runtimes) or Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
