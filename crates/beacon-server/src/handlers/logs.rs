//! `POST /api/logs`: emit a caller-described record at the requested level.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::Request;
use axum::http::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use beacon_core::log::Level;
use beacon_core::metrics::BUSINESS_OPERATIONS_TOTAL;
use beacon_core::{Registry, StructuredLogger};

use super::Handler;
use crate::error::ApiError;
use crate::lifecycle::READ_TIMEOUT;
use crate::response::{write_json, ResponseSink};

const OPERATION: &str = "log_trigger";
const MAX_BODY_BYTES: usize = 1024 * 1024;
const DEFAULT_LEVEL: &str = "info";

/// Request body. Absent and `null` members both take the default.
#[derive(Debug, Default, Deserialize)]
pub struct LogTrigger {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub fields: Option<Map<String, Value>>,
}

impl LogTrigger {
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or(DEFAULT_LEVEL)
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }

    /// Level to log at, plus the business-counter status it implies (if any).
    ///
    /// Names match exactly; anything else, including `WARN` or `warning`,
    /// logs at INFO without a level counter.
    pub fn resolve(&self) -> (Level, Option<&'static str>) {
        match self.level() {
            "error" => (Level::Error, Some("error")),
            "warn" => (Level::Warn, Some("warn")),
            "debug" => (Level::Debug, None),
            _ => (Level::Info, None),
        }
    }
}

pub struct LogsHandler {
    registry: Arc<Registry>,
    logger: StructuredLogger,
    read_timeout: Duration,
}

impl LogsHandler {
    pub fn new(registry: Arc<Registry>, logger: StructuredLogger) -> Self {
        Self {
            registry,
            logger,
            read_timeout: READ_TIMEOUT,
        }
    }

    /// Bound on reading the whole request body.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    fn count(&self, status: &str) {
        if let Err(e) = self.registry.increment(BUSINESS_OPERATIONS_TOTAL, &[OPERATION, status]) {
            tracing::warn!(error = %e, code = e.code(), "business counter update rejected");
        }
    }

    async fn parse(&self, req: Request) -> Result<LogTrigger, String> {
        let read = axum::body::to_bytes(req.into_body(), MAX_BODY_BYTES);
        let bytes = match tokio::time::timeout(self.read_timeout, read).await {
            Ok(res) => res.map_err(|e| e.to_string())?,
            Err(_) => return Err(format!("body not read within {:?}", self.read_timeout)),
        };
        serde_json::from_slice(&bytes).map_err(|e| e.to_string())
    }
}

#[async_trait]
impl Handler for LogsHandler {
    async fn serve(&self, req: Request, out: &mut dyn ResponseSink) {
        if req.method() != Method::POST {
            ApiError::MethodNotAllowed.write_to(out);
            return;
        }

        let mut trigger = match self.parse(req).await {
            Ok(t) => t,
            Err(error) => {
                self.logger.error("invalid_request", json!({ "error": error }));
                ApiError::InvalidBody.write_to(out);
                return;
            }
        };

        let (level, outcome) = trigger.resolve();
        let fields = trigger.fields.take().unwrap_or_default();
        self.logger.log(level, trigger.message(), Value::Object(fields));
        if let Some(status) = outcome {
            self.count(status);
        }
        self.count("success");

        write_json(
            out,
            StatusCode::OK,
            &json!({ "status": "logged", "level": trigger.level() }),
        );
    }
}
