//! Axum router and all HTTP handlers for nf-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. All handlers are `pub(crate)` so integration tests can
//! compose the router directly.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::info;

use crate::{
    api_types::{CreateSourceRequest, DeletedResponse, ErrorResponse, HealthResponse, SourceResponse},
    state::AppState,
};

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/feeds", get(list_feeds).post(add_feed))
        .route("/v1/feeds/:id", delete(delete_feed))
        .route("/v1/stats", get(stats))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service,
            version: st.build.version,
        }),
    )
}

// ---------------------------------------------------------------------------
// GET /v1/feeds
// ---------------------------------------------------------------------------

pub(crate) async fn list_feeds(State(st): State<Arc<AppState>>) -> Response {
    let sources = match nf_store::list_sources(&st.pool).await {
        Ok(sources) => sources,
        Err(err) => return internal_error(err),
    };

    let mut out = Vec::with_capacity(sources.len());
    for source in sources {
        let item_count = match nf_store::count_items_for_source(&st.pool, source.id).await {
            Ok(count) => count,
            Err(err) => return internal_error(err),
        };
        out.push(SourceResponse {
            id: source.id,
            url: source.url,
            name: source.name,
            last_checked: source.last_checked,
            interval_seconds: source.interval_seconds,
            created_at: source.created_at,
            item_count,
        });
    }

    (StatusCode::OK, Json(out)).into_response()
}

// ---------------------------------------------------------------------------
// POST /v1/feeds
// ---------------------------------------------------------------------------

pub(crate) async fn add_feed(
    State(st): State<Arc<AppState>>,
    Json(req): Json<CreateSourceRequest>,
) -> Response {
    match nf_store::find_source_by_url(&st.pool, &req.url).await {
        Ok(Some(_)) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "feed already exists".to_string(),
                }),
            )
                .into_response()
        }
        Ok(None) => {}
        Err(err) => return internal_error(err),
    }

    let name = req.name.filter(|n| !n.trim().is_empty()).unwrap_or_else(|| req.url.clone());

    let source = match nf_store::create_source(
        &st.pool,
        &req.url,
        &name,
        st.tuning.default_interval_seconds as i32,
    )
    .await
    {
        Ok(source) => source,
        Err(err) => return internal_error(err),
    };

    info!(url = %source.url, "feed added");

    (
        StatusCode::OK,
        Json(SourceResponse {
            id: source.id,
            url: source.url,
            name: source.name,
            last_checked: source.last_checked,
            interval_seconds: source.interval_seconds,
            created_at: source.created_at,
            item_count: 0,
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// DELETE /v1/feeds/{id}
// ---------------------------------------------------------------------------

pub(crate) async fn delete_feed(State(st): State<Arc<AppState>>, Path(id): Path<i64>) -> Response {
    match nf_store::delete_source(&st.pool, id).await {
        Ok(true) => (StatusCode::OK, Json(DeletedResponse { status: "deleted", id })).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "feed not found".to_string(),
            }),
        )
            .into_response(),
        Err(err) => internal_error(err),
    }
}

// ---------------------------------------------------------------------------
// GET /v1/stats
// ---------------------------------------------------------------------------

pub(crate) async fn stats(State(st): State<Arc<AppState>>) -> Response {
    match nf_store::stats(&st.pool).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => internal_error(err),
    }
}

fn internal_error(err: anyhow::Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}
