//! Service configuration.
//!
//! The YAML file is optional: without one the built-in defaults apply. When a
//! file is given it is parsed strictly (unknown keys are errors) and then
//! validated as a whole.

pub mod schema;

use std::path::Path;

use beacon_core::error::{BeaconError, Result};

pub use schema::{LoggingSection, ServiceConfig, ServiceSection};

/// Defaults when `path` is `None`, otherwise the parsed file.
pub fn load(path: Option<&Path>) -> Result<ServiceConfig> {
    match path {
        Some(path) => load_from_file(path),
        None => Ok(ServiceConfig::default()),
    }
}

pub fn load_from_file(path: impl AsRef<Path>) -> Result<ServiceConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| BeaconError::ConfigRead {
        path: path.display().to_string(),
        source,
    })?;
    load_from_str(&text)
}

pub fn load_from_str(text: &str) -> Result<ServiceConfig> {
    let cfg = serde_yaml::from_str::<ServiceConfig>(text)
        .map_err(|e| BeaconError::BadRequest(format!("config is not valid: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
