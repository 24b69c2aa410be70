//! Beacon server library entry.
//!
//! Wires the instrumentation middleware, the demo handlers, the metrics
//! endpoint and the graceful lifecycle into one service. Consumed by the
//! binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod middleware;
pub mod ops;
pub mod response;
pub mod router;
