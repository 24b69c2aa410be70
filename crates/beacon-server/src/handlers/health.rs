use async_trait::async_trait;
use axum::extract::Request;
use axum::http::StatusCode;
use serde_json::json;

use beacon_core::log::rfc3339_now;

use super::Handler;
use crate::response::{write_json, ResponseSink};

pub struct HealthHandler {
    service: String,
    version: String,
}

impl HealthHandler {
    pub fn new(service: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            version: version.into(),
        }
    }
}

#[async_trait]
impl Handler for HealthHandler {
    async fn serve(&self, _req: Request, out: &mut dyn ResponseSink) {
        let body = json!({
            "status": "healthy",
            "service": self.service,
            "version": self.version,
            "time": rfc3339_now(),
        });
        write_json(out, StatusCode::OK, &body);
    }
}
