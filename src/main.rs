use std::net::SocketAddr;
use std::process::ExitCode;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use trust_gate::routes::ROUTES;
use trust_gate::{AppState, Config, build_router, metrics, store, utils};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

/// Run the application, returning an exit code on error.
async fn run() -> Result<(), exitcode::ExitCode> {
    // Configuration comes first so the log format can follow it; a failure
    // here is reported through a default text subscriber.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            utils::init_tracing("info", false);
            error!("Configuration error: {e}");
            return Err(exitcode::CONFIG);
        }
    };
    utils::init_tracing(&config.log_level, config.log_json);

    info!(
        "Starting Trust Gate v{} as '{}'",
        env!("CARGO_PKG_VERSION"),
        config.service_name
    );
    info!(
        host = %config.host,
        port = %config.port,
        store_timeout_ms = config.store_timeout.as_millis() as u64,
        bootstrap_services = ?config.bootstrap_services,
        "Configuration loaded"
    );
    if !config.bootstrap_enabled() {
        info!("BOOTSTRAP_TOKEN not set; bootstrap exception disabled");
    }

    // Open and probe the key store
    let key_store = store::connect(&config).await.map_err(|e| {
        error!("Failed to open key store: {e}");
        exitcode::UNAVAILABLE
    })?;

    let state = AppState::new(key_store, config.clone());
    state
        .registry()
        .health_check(config.store_connect_timeout)
        .await
        .map_err(|e| {
            error!("Key store health check failed: {e}");
            exitcode::UNAVAILABLE
        })?;
    info!("Key store reachable");

    if let Some(metrics_addr) = config.metrics_addr() {
        metrics::try_init_metrics(metrics_addr);
    } else {
        warn!("Metrics export disabled (METRICS_PORT=0)");
    }

    let app = build_router(state.clone());

    let addr: SocketAddr = config.server_addr().parse().map_err(|e| {
        error!("Invalid server address: {e}");
        exitcode::CONFIG
    })?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!("Failed to bind to {addr}: {e}");
        exitcode::UNAVAILABLE
    })?;

    info!("Server listening on http://{addr}");
    for route in ROUTES {
        info!("  {:<5} {:<28} ({:?})", route.method, route.path, route.gate);
    }

    state.start_announcements();

    axum::serve(listener, app)
        .with_graceful_shutdown(utils::shutdown_signal())
        .await
        .map_err(|e| {
            error!("Server error: {e}");
            exitcode::SOFTWARE
        })?;

    info!("HTTP server stopped, shutting down background tasks...");
    state.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}
