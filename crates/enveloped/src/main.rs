//! `enveloped`: envelope encryption over HTTP.
//!
//! Startup sequence:
//! 1. Load and validate [`Config`] from environment variables.
//! 2. Initialise the telemetry pipeline (tracing + optional OTLP).
//! 3. Build the configured key provider into [`AppState`].
//! 4. Build the Axum router and serve until SIGINT/SIGTERM.

mod config;
mod server;
mod telemetry;

use anyhow::{Context, Result};
use tracing::info;

use config::Config;
use server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // -----------------------------------------------------------------------
    // 1. Configuration
    // -----------------------------------------------------------------------
    let cfg = Config::from_env().map_err(|e| {
        // Telemetry is not yet up; write to stderr directly.
        eprintln!("ERROR: configuration invalid: {e:#}");
        e
    })?;

    // -----------------------------------------------------------------------
    // 2. Telemetry
    // -----------------------------------------------------------------------
    telemetry::init_telemetry(cfg.otel_exporter_otlp_endpoint.as_deref(), &cfg.log_level)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = cfg.listen_port,
        provider = ?cfg.provider,
        "enveloped starting"
    );

    // -----------------------------------------------------------------------
    // 3. Key provider
    // -----------------------------------------------------------------------
    let state = AppState::from_config(&cfg).await?;

    // -----------------------------------------------------------------------
    // 4. HTTP server
    // -----------------------------------------------------------------------
    let router = server::router::build(state, cfg.request_timeout());

    let addr: std::net::SocketAddr = ([0, 0, 0, 0], cfg.listen_port).into();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutting down");
    telemetry::shutdown_telemetry();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
