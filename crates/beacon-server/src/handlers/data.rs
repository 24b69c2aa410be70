//! Simulated data fetch: random latency and a configurable failure rate.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::extract::Request;
use axum::http::StatusCode;
use rand::Rng;
use serde_json::json;

use beacon_core::log::rfc3339_now;
use beacon_core::metrics::{BUSINESS_OPERATIONS_TOTAL, DATA_PROCESSING_DURATION_SECONDS};
use beacon_core::{Registry, StructuredLogger};

use super::Handler;
use crate::error::ApiError;
use crate::response::{write_json, ResponseSink};

const OPERATION: &str = "data_fetch";

pub struct DataHandler {
    registry: Arc<Registry>,
    logger: StructuredLogger,
    failure_rate: f64,
    delay_ms: RangeInclusive<u64>,
}

impl DataHandler {
    /// 50–150ms of work, 10% failures.
    pub fn new(registry: Arc<Registry>, logger: StructuredLogger) -> Self {
        Self {
            registry,
            logger,
            failure_rate: 0.1,
            delay_ms: 50..=150,
        }
    }

    /// Clamped to `[0, 1]`.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: RangeInclusive<u64>) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    fn count(&self, status: &str) {
        if let Err(e) = self.registry.increment(BUSINESS_OPERATIONS_TOTAL, &[OPERATION, status]) {
            tracing::warn!(error = %e, code = e.code(), "business counter update rejected");
        }
    }
}

#[async_trait]
impl Handler for DataHandler {
    async fn serve(&self, _req: Request, out: &mut dyn ResponseSink) {
        let start = Instant::now();
        let (delay, failed) = {
            let mut rng = rand::thread_rng();
            let delay = if self.delay_ms.is_empty() {
                0
            } else {
                rng.gen_range(self.delay_ms.clone())
            };
            (Duration::from_millis(delay), rng.gen_bool(self.failure_rate))
        };

        tokio::time::sleep(delay).await;

        if failed {
            self.count("failure");
            self.logger
                .error("data_fetch_failed", json!({ "reason": "simulated_error" }));
            let err = ApiError::Downstream("data processing failed");
            err.write_to(out);
            return;
        }
        self.count("success");

        if let Err(e) = self.registry.observe(
            DATA_PROCESSING_DURATION_SECONDS,
            &[],
            start.elapsed().as_secs_f64(),
        ) {
            tracing::warn!(error = %e, code = e.code(), "processing histogram update rejected");
        }

        let (id, value) = {
            let mut rng = rand::thread_rng();
            let id: u32 = rng.gen_range(1..=10_000);
            let value: f64 = (rng.gen::<f64>() * 10_000.0).round() / 100.0;
            (id, value)
        };
        let processing_ms = delay.as_millis() as u64;

        self.logger.info(
            "data_processed",
            json!({ "record_id": id, "processing_ms": processing_ms }),
        );

        let body = json!({
            "id": id,
            "timestamp": rfc3339_now(),
            "value": value,
            "status": "processed",
            "processing_time_ms": processing_ms,
        });
        write_json(out, StatusCode::OK, &body);
    }
}
