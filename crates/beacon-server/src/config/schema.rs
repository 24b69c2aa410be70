use std::net::SocketAddr;

use beacon_core::error::{BeaconError, Result};
use beacon_core::log::Level;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    pub version: u32,

    #[serde(default)]
    pub service: ServiceSection,

    #[serde(default)]
    pub logging: LoggingSection,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            version: 1,
            service: ServiceSection::default(),
            logging: LoggingSection::default(),
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(BeaconError::UnsupportedVersion);
        }

        self.service.validate()?;

        Ok(())
    }

    /// Listen address. Valid after `validate()`.
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.service.listen.parse().map_err(|e| {
            BeaconError::BadRequest(format!("service.listen must be a socket address: {e}"))
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSection {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            listen: default_listen(),
        }
    }
}

impl ServiceSection {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(BeaconError::BadRequest("service.name must not be empty".into()));
        }
        if self.listen.parse::<SocketAddr>().is_err() {
            return Err(BeaconError::BadRequest(format!(
                "service.listen must be a socket address, got {:?}",
                self.listen
            )));
        }
        Ok(())
    }
}

fn default_name() -> String {
    "beacon".into()
}
fn default_listen() -> String {
    "0.0.0.0:8080".into()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Structured records below this level are discarded.
    #[serde(default = "default_min_level")]
    pub min_level: Level,

    /// `tracing` filter for process diagnostics; `RUST_LOG` takes precedence.
    #[serde(default = "default_diagnostics")]
    pub diagnostics: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            min_level: default_min_level(),
            diagnostics: default_diagnostics(),
        }
    }
}

fn default_min_level() -> Level {
    Level::Debug
}
fn default_diagnostics() -> String {
    "beacon_server=info,beacon_core=info".into()
}
