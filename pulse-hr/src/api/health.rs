//! Liveness endpoint

use axum::{routing::get, Json, Router};
use serde::Serialize;

use super::buildinfo::BuildInfo;
use crate::{AppState, MODULE_NAME};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
}

/// GET /health
///
/// Answers as long as the listener is accepting.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        module: MODULE_NAME,
        version: BuildInfo::current().version,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
