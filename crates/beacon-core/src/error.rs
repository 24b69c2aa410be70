//! Shared error type across beacon crates.

use std::time::Duration;

use thiserror::Error;

/// Shared result type.
pub type Result<T> = std::result::Result<T, BeaconError>;

/// Unified error type used by core and server.
#[derive(Debug, Error)]
pub enum BeaconError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("cannot read config {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unknown metric: {0}")]
    UnknownMetric(String),
    #[error("metric {name} is a {actual}, not a {expected}")]
    MetricKind {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("metric {name} expects {expected} label values, got {got}")]
    LabelCardinality {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("invalid buckets for {0}: boundaries must be finite, non-empty and strictly ascending")]
    InvalidBuckets(String),
    #[error("metric already declared: {0}")]
    DuplicateMetric(String),
    #[error("invalid lifecycle transition: {0}")]
    InvalidTransition(String),
    #[error("bind failed: {0}")]
    Bind(#[source] std::io::Error),
    #[error("serve failed: {0}")]
    Serve(String),
    #[error("graceful drain did not finish within {0:?}")]
    DrainTimeout(Duration),
    #[error("internal: {0}")]
    Internal(String),
}

impl BeaconError {
    /// Stable machine-readable code, used as a log field.
    pub fn code(&self) -> &'static str {
        match self {
            BeaconError::BadRequest(_) => "BAD_REQUEST",
            BeaconError::UnsupportedVersion => "UNSUPPORTED_VERSION",
            BeaconError::ConfigRead { .. } => "CONFIG_READ",
            BeaconError::UnknownMetric(_) => "UNKNOWN_METRIC",
            BeaconError::MetricKind { .. } => "METRIC_KIND",
            BeaconError::LabelCardinality { .. } => "LABEL_CARDINALITY",
            BeaconError::InvalidBuckets(_) => "INVALID_BUCKETS",
            BeaconError::DuplicateMetric(_) => "DUPLICATE_METRIC",
            BeaconError::InvalidTransition(_) => "INVALID_TRANSITION",
            BeaconError::Bind(_) => "BIND",
            BeaconError::Serve(_) => "SERVE",
            BeaconError::DrainTimeout(_) => "DRAIN_TIMEOUT",
            BeaconError::Internal(_) => "INTERNAL",
        }
    }
}
