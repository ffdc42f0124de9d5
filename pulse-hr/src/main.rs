//! pulse-hr - synthetic heart rate event stream service
//!
//! Serves a `text/event-stream` endpoint that emits a random heart rate
//! every two seconds per connected client.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pulse_common::ServiceConfig;
use pulse_hr::{AppState, BuildInfo, EmitterSettings, MODULE_NAME};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for pulse-hr
#[derive(Parser, Debug)]
#[command(name = "pulse-hr")]
#[command(about = "Heart rate Server-Sent Events service")]
#[command(version)]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "PULSE_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides config file)
    #[arg(short, long, env = "PULSE_BIND")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Resolved before tracing exists; the outcome is logged once the subscriber is up
    let loaded =
        ServiceConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    let mut config = loaded.config.clone();
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    config.validate().context("Invalid configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "pulse_hr={level},pulse_common={level},tower_http=info",
                    level = config.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Log build identification immediately after tracing init
    info!("Starting {} {}", MODULE_NAME, BuildInfo::current());
    loaded.log_outcome();
    info!(
        "Emitting every {} ms, retry hint {} ms",
        config.emit_interval_ms, config.retry_ms
    );

    let settings = EmitterSettings::from_config(&config).context("Invalid stream settings")?;
    let state = AppState::new(settings, CancellationToken::new());

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    pulse_hr::run(listener, state, shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
