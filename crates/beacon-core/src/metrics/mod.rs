//! In-process metrics registry.
//!
//! Families are declared once through [`RegistryBuilder`] and then mutated only
//! through `increment`/`observe`/`set`. Each labeled family keeps its series in
//! a `DashMap` keyed by the label-value tuple, so concurrent updates to
//! different series never contend and a scrape ([`Registry::snapshot`]) only
//! holds one shard or series lock at a time.

mod family;
mod registry;
mod render;

pub use family::{CounterVec, Gauge, HistogramVec};
pub use registry::{
    FamilySnapshot, MetricKind, Registry, RegistryBuilder, RegistrySnapshot, SeriesSnapshot,
    SeriesValue,
};

pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
pub const ACTIVE_CONNECTIONS: &str = "active_connections";
pub const BUSINESS_OPERATIONS_TOTAL: &str = "business_operations_total";
pub const DATA_PROCESSING_DURATION_SECONDS: &str = "data_processing_duration_seconds";

/// Default latency buckets (seconds).
pub const DEFAULT_BUCKETS: [f64; 11] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Buckets for sub-10-second processing work (seconds).
pub const PROCESSING_BUCKETS: [f64; 11] =
    [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
