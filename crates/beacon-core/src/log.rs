//! Structured JSON logging.
//!
//! Every call produces one [`LogRecord`] and writes it as a single JSON line to
//! a [`LogSink`]. The base keys (`timestamp`, `level`, `message`, `service`)
//! always win over caller-supplied fields of the same name.
//!
//! Serialization and write failures never reach the caller; they are reported
//! as `tracing` diagnostics instead.

use std::fmt;
use std::io::Write;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{BeaconError, Result};

/// Log severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
}

impl Level {
    /// Uppercase name written into records.
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = BeaconError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            other => Err(BeaconError::BadRequest(format!("unknown log level: {other}"))),
        }
    }
}

/// Current UTC time formatted the way records and payloads carry it.
pub fn rfc3339_now() -> String {
    format_timestamp(Utc::now())
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// One immutable log event.
#[derive(Debug, Clone)]
pub struct LogRecord {
    timestamp: DateTime<Utc>,
    level: Level,
    message: String,
    service: Arc<str>,
    fields: Map<String, Value>,
}

impl LogRecord {
    pub fn new(level: Level, message: impl Into<String>, service: Arc<str>, fields: Value) -> Self {
        let fields = match fields {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("fields".into(), other);
                map
            }
        };
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            service,
            fields,
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Flatten into the wire object: extra fields first, base keys on top.
    pub fn to_json(&self) -> Value {
        let mut out = self.fields.clone();
        out.insert("timestamp".into(), Value::String(format_timestamp(self.timestamp)));
        out.insert("level".into(), Value::String(self.level.as_str().into()));
        out.insert("message".into(), Value::String(self.message.clone()));
        out.insert("service".into(), Value::String(self.service.to_string()));
        Value::Object(out)
    }
}

/// Destination for serialized records. One call per record.
pub trait LogSink: Send + Sync {
    fn write_line(&self, line: &str) -> std::io::Result<()>;
}

/// Writes each record to stdout under the stdout lock.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut out = std::io::stdout().lock();
        out.write_all(line.as_bytes())?;
        out.write_all(b"\n")
    }
}

/// Keeps lines in memory. Useful for asserting on emitted records.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Parsed records, skipping anything that is not JSON.
    pub fn records(&self) -> Vec<Value> {
        self.lines()
            .iter()
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect()
    }

    /// Records whose `message` equals `message`.
    pub fn find(&self, message: &str) -> Vec<Value> {
        self.records()
            .into_iter()
            .filter(|r| r.get("message").and_then(Value::as_str) == Some(message))
            .collect()
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, line: &str) -> std::io::Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
        Ok(())
    }
}

/// Leveled logger bound to a fixed service name.
///
/// Cheap to clone; clones share the sink.
#[derive(Clone)]
pub struct StructuredLogger {
    service: Arc<str>,
    min_level: Level,
    sink: Arc<dyn LogSink>,
}

impl fmt::Debug for StructuredLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuredLogger")
            .field("service", &self.service)
            .field("min_level", &self.min_level)
            .finish_non_exhaustive()
    }
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            service: Arc::from(service.into()),
            min_level: Level::Debug,
            sink,
        }
    }

    /// Logger writing to stdout.
    pub fn stdout(service: impl Into<String>) -> Self {
        Self::new(service, Arc::new(StdoutSink))
    }

    /// Drop records below `level`.
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn log(&self, level: Level, message: &str, fields: Value) {
        if level < self.min_level {
            return;
        }
        let record = LogRecord::new(level, message, Arc::clone(&self.service), fields);
        self.emit(&record);
    }

    /// Serialize and write an already-built record.
    pub fn emit(&self, record: &LogRecord) {
        let line = match serde_json::to_string(&record.to_json()) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, record = record.message(), "log record serialization failed");
                return;
            }
        };
        if let Err(e) = self.sink.write_line(&line) {
            tracing::warn!(error = %e, "log sink write failed");
        }
    }

    pub fn info(&self, message: &str, fields: Value) {
        self.log(Level::Info, message, fields);
    }

    pub fn warn(&self, message: &str, fields: Value) {
        self.log(Level::Warn, message, fields);
    }

    pub fn error(&self, message: &str, fields: Value) {
        self.log(Level::Error, message, fields);
    }

    pub fn debug(&self, message: &str, fields: Value) {
        self.log(Level::Debug, message, fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parsing_accepts_aliases() {
        assert_eq!("WARNING".parse::<Level>().ok(), Some(Level::Warn));
        assert_eq!("debug".parse::<Level>().ok(), Some(Level::Debug));
        assert!("loud".parse::<Level>().is_err());
    }

    #[test]
    fn timestamp_has_second_precision() {
        let ts = rfc3339_now();
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), "2024-01-01T00:00:00Z".len());
    }
}
