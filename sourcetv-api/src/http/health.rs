//! Health check endpoint
//!
//! Serves the latest background health report, checking on demand when none
//! exists yet.

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::http::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub name: String,
    pub version: String,
    /// `ok` when every provider is reachable, otherwise `degraded`
    pub status: &'static str,
    pub providers: BTreeMap<String, bool>,
    pub checked_at: DateTime<Utc>,
}

/// Health check router
pub fn create_health_router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let report = state.services.health.report().await;
    let status = if report.all_healthy() { "ok" } else { "degraded" };

    Json(HealthResponse {
        name: state.config.server.name.clone(),
        version: state.config.server.version.clone(),
        status,
        providers: report.providers,
        checked_at: report.checked_at,
    })
}
