//! Beacon server binary.
//!
//! Usage: `beacon-server [config.yaml]`. Without a path the built-in
//! defaults apply (listen on 0.0.0.0:8080).
//!
//! Business records go to stdout as JSON lines; process diagnostics go to
//! stderr through `tracing`.

use std::path::PathBuf;

use serde_json::json;
use tracing_subscriber::{fmt, EnvFilter};

use beacon_server::app_state::{AppState, SERVICE_VERSION};
use beacon_server::config;
use beacon_server::lifecycle::{shutdown_signal, ServerLifecycle};
use beacon_server::router;

#[tokio::main]
async fn main() {
    let path = std::env::args_os().nth(1).map(PathBuf::from);
    let cfg = match config::load(path.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("config load failed ({}): {e}", e.code());
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cfg.logging.diagnostics));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let state = match AppState::from_config(cfg) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, code = e.code(), "failed to build application state");
            std::process::exit(1);
        }
    };
    let listen = match state.cfg().listen_addr() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!(error = %e, "invalid listen address");
            std::process::exit(1);
        }
    };

    let logger = state.logger().clone();
    logger.info(
        "starting_application",
        json!({ "version": SERVICE_VERSION, "port": listen.port() }),
    );

    let server = ServerLifecycle::new(router::build_router(state), logger);
    let listener = match server.bind(listen).await {
        Ok(listener) => listener,
        Err(_) => std::process::exit(1),
    };
    if server.run(listener, shutdown_signal()).await.is_err() {
        std::process::exit(1);
    }
}
