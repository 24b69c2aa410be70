//! Shared application state.
//!
//! The registry and logger are constructed once at startup and handed to the
//! middleware and handlers from here; nothing in the service is a global.

use std::sync::Arc;

use beacon_core::error::Result;
use beacon_core::{Registry, StructuredLogger};

use crate::config::ServiceConfig;
use crate::middleware::Instrumentation;

pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: ServiceConfig,
    registry: Arc<Registry>,
    logger: StructuredLogger,
    instrumentation: Instrumentation,
}

impl AppState {
    pub fn new(cfg: ServiceConfig, registry: Arc<Registry>, logger: StructuredLogger) -> Self {
        let instrumentation = Instrumentation::new(Arc::clone(&registry), logger.clone());
        Self {
            inner: Arc::new(AppStateInner {
                cfg,
                registry,
                logger,
                instrumentation,
            }),
        }
    }

    /// Standard metric set and a stdout logger named after the service.
    pub fn from_config(cfg: ServiceConfig) -> Result<Self> {
        let registry = Arc::new(Registry::standard()?);
        let logger = StructuredLogger::stdout(cfg.service.name.clone())
            .with_min_level(cfg.logging.min_level);
        Ok(Self::new(cfg, registry, logger))
    }

    pub fn cfg(&self) -> &ServiceConfig {
        &self.inner.cfg
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.inner.registry)
    }

    pub fn logger(&self) -> &StructuredLogger {
        &self.inner.logger
    }

    pub fn instrumentation(&self) -> Instrumentation {
        self.inner.instrumentation.clone()
    }

    pub fn service_name(&self) -> &str {
        &self.inner.cfg.service.name
    }
}
