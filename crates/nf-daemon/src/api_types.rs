//! Request/response bodies for the HTTP control surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Deserialize)]
pub struct CreateSourceRequest {
    pub url: String,
    pub name: Option<String>,
}

#[derive(Serialize)]
pub struct SourceResponse {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub last_checked: Option<DateTime<Utc>>,
    pub interval_seconds: i32,
    pub created_at: DateTime<Utc>,
    pub item_count: i64,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct DeletedResponse {
    pub status: &'static str,
    pub id: i64,
}
