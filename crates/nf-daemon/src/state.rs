//! Shared runtime state for nf-daemon.
//!
//! All types here are `Clone`-able (via `Arc`). Handlers receive
//! `State<Arc<AppState>>` from Axum; this module owns nothing async itself
//! beyond the Supervisor it wraps.

use std::sync::Arc;

use nf_config::PipelineTuning;
use nf_runtime::Supervisor;
use sqlx::PgPool;
use tokio::sync::Mutex;

/// Static build metadata included in health responses.
#[derive(Clone, Debug, serde::Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub build: BuildInfo,
    pub tuning: PipelineTuning,
    /// The running Supervisor, torn down and a fresh one created whenever the
    /// pipeline needs to restart (currently: never, from the HTTP surface).
    pub supervisor: Arc<Mutex<Option<Supervisor>>>,
}

impl AppState {
    pub fn new(pool: PgPool, tuning: PipelineTuning) -> Self {
        Self {
            pool,
            build: BuildInfo {
                service: "nf-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            tuning,
            supervisor: Arc::new(Mutex::new(None)),
        }
    }
}
