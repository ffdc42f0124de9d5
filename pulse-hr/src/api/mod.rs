//! HTTP API for pulse-hr

pub mod buildinfo;
pub mod health;
pub mod sse;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub use buildinfo::{get_build_info, BuildInfo};
pub use health::health_routes;
pub use sse::heart_rate_stream;

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/sse-item", get(heart_rate_stream))
        .route("/build_info", get(get_build_info))
        .merge(health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // Browser EventSource clients may be served from another origin
        .layer(CorsLayer::permissive())
}
