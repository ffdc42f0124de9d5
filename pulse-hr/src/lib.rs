//! pulse-hr library - synthetic heart rate event stream
//!
//! Serves `GET /sse-item`: a `text/event-stream` response that emits a random
//! heart rate every two seconds until the client disconnects or the server
//! shuts down.

use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub mod api;
pub mod emitter;
pub mod error;
pub mod sample;

pub use api::{build_router, BuildInfo};
pub use emitter::{EmitterSettings, HeartRateEmitter};
pub use error::{Error, Result};
pub use sample::HeartRateSample;

/// Service name reported by `/health` and in logs
pub const MODULE_NAME: &str = "pulse-hr";

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Pacing and envelope for every heart rate stream
    pub settings: Arc<EmitterSettings>,
    /// Server-wide shutdown token; each connection gets a child of it
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(settings: EmitterSettings, shutdown: CancellationToken) -> Self {
        Self {
            settings: Arc::new(settings),
            shutdown,
        }
    }
}

/// Serve the API on an already bound listener until `shutdown_signal` resolves
///
/// When the signal resolves, the shutdown token is cancelled so every open
/// event stream ends and graceful shutdown can complete.
pub async fn run<F>(listener: TcpListener, state: AppState, shutdown_signal: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let shutdown = state.shutdown.clone();
    let app = build_router(state);

    let addr = listener
        .local_addr()
        .map_err(|e| Error::Http(format!("Listener has no local address: {}", e)))?;
    info!("pulse-hr listening on http://{}", addr);
    info!("Heart rate stream: http://{}/sse-item", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal.await;
            info!("Closing open event streams");
            shutdown.cancel();
        })
        .await
        .map_err(|e| Error::Http(format!("Server error: {}", e)))?;

    info!("Server shutdown complete");
    Ok(())
}
