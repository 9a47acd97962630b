//! nf-daemon entry point.
//!
//! This file is intentionally thin: it sets up tracing, loads config, wires
//! the Supervisor, and starts the HTTP server. All route handlers live in
//! `routes.rs`; all shared state types live in `state.rs`.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use nf_daemon::{routes, state};
use nf_runtime::{HttpPublisher, HttpRanker, HttpSourceDecoder, Supervisor};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Dev convenience: load .env.local if present. Silent if absent —
    // production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let config_paths = config_paths_from_env();
    let config_path_refs: Vec<&str> = config_paths.iter().map(String::as_str).collect();
    let loaded = nf_config::load_layered_yaml(&config_path_refs)
        .context("failed to load layered config")?;
    info!(config_hash = %loaded.config_hash, "config loaded");

    let tuning = nf_config::PipelineTuning::from_config(&loaded.config_json);
    let secrets =
        nf_config::resolve_secrets(&loaded.config_json).context("failed to resolve secrets")?;

    let pool = nf_store::connect_from_env().await?;
    nf_store::migrate(&pool).await?;

    let decoder = Box::new(HttpSourceDecoder::new());
    let ranker = Box::new(HttpRanker::new(
        secrets.scoring_api_base_url.clone(),
        tuning.ranker_timeout_seconds,
    ));
    let publisher = Box::new(HttpPublisher::new(secrets.chat_webhook_url.clone()));

    let supervisor = Supervisor::spawn(pool.clone(), tuning, decoder, ranker, publisher);

    let shared = Arc::new(state::AppState::new(pool, tuning));
    *shared.supervisor.lock().await = Some(supervisor);

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8787)));
    info!("nf-daemon listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown_state = Arc::clone(&shared);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_state))
        .await
        .context("server crashed")?;

    Ok(())
}

async fn shutdown_signal(state: Arc<state::AppState>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
    if let Some(supervisor) = state.supervisor.lock().await.take() {
        supervisor.shutdown().await;
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("NF_DAEMON_ADDR").ok()?.parse().ok()
}

fn config_paths_from_env() -> Vec<String> {
    std::env::var("NF_CONFIG_PATHS")
        .unwrap_or_else(|_| "config/base.yaml".to_string())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}
