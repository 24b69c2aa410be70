//! Axum router wiring.
//!
//! Fixed path table. Every path except `/metrics` goes through the
//! instrumentation; anything unmatched is answered by the health handler.

use axum::{routing::any, Router};

use crate::app_state::{AppState, SERVICE_VERSION};
use crate::handlers::{DataHandler, HealthHandler, LogsHandler};
use crate::middleware::instrumented;
use crate::ops;

pub fn build_router(state: AppState) -> Router {
    let data = DataHandler::new(state.registry(), state.logger().clone());
    let logs = LogsHandler::new(state.registry(), state.logger().clone());
    build_router_with(state, data, logs)
}

/// Same table with explicit data and log handlers.
pub fn build_router_with(state: AppState, data: DataHandler, logs: LogsHandler) -> Router {
    let mw = state.instrumentation();
    let health = || HealthHandler::new(state.service_name(), SERVICE_VERSION);

    Router::new()
        .route("/", instrumented(mw.clone(), health()))
        .route("/metrics", any(ops::metrics))
        .route("/api/data", instrumented(mw.clone(), data))
        .route("/api/logs", instrumented(mw.clone(), logs))
        .fallback_service(instrumented::<(), _>(mw, health()))
        .with_state(state)
}
