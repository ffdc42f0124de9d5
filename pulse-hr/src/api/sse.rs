//! Server-Sent Events endpoint for the heart rate stream

use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use pulse_common::sse::{encode_stream, CONTENT_TYPE};
use tracing::info;

use crate::emitter::HeartRateEmitter;
use crate::AppState;

/// GET /sse-item - heart rate event stream
///
/// Always answers `text/event-stream`; any `Accept` header is ignored. Each
/// connection owns its emitter and a child of the server shutdown token, so
/// connections never share state.
pub async fn heart_rate_stream(State(state): State<AppState>) -> Response {
    let emitter = HeartRateEmitter::new(state.settings.clone(), state.shutdown.child_token());
    info!(
        connection = %emitter.connection_id(),
        "New SSE client connected to heart rate stream"
    );

    let body = Body::from_stream(encode_stream(emitter.into_stream()));

    (
        [
            (header::CONTENT_TYPE, CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}
