//! beacon core: transport-agnostic telemetry primitives and the shared error type.
//!
//! This crate holds the structured logger and the metrics registry that the
//! server's instrumentation middleware updates. It carries no transport or
//! runtime dependencies so the registry and logger can be constructed and
//! inspected directly in tests.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Metric updates
//! report bad names or label arity as `BeaconError`, and logging never fails
//! its caller.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod log;
pub mod metrics;

/// Shared result type.
pub use error::{BeaconError, Result};
pub use log::{Level, LogRecord, StructuredLogger};
pub use metrics::Registry;
