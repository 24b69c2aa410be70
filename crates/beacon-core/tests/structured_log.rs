//! StructuredLogger record shape and filtering.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use serde_json::json;

use beacon_core::log::{Level, LogSink, MemorySink};
use beacon_core::StructuredLogger;

fn logger() -> (StructuredLogger, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let logger = StructuredLogger::new("beacon-test", sink.clone() as Arc<dyn LogSink>);
    (logger, sink)
}

#[test]
fn one_line_per_call_with_merged_fields() {
    let (logger, sink) = logger();
    logger.info("incoming_request", json!({"method": "GET", "path": "/"}));
    logger.error("data_fetch_failed", json!({"reason": "simulated_error"}));

    let lines = sink.lines();
    assert_eq!(lines.len(), 2);
    assert!(!lines[0].contains('\n'));

    let rec = &sink.records()[0];
    assert_eq!(rec["level"], "INFO");
    assert_eq!(rec["message"], "incoming_request");
    assert_eq!(rec["service"], "beacon-test");
    assert_eq!(rec["method"], "GET");
    assert_eq!(rec["path"], "/");
    assert!(rec["timestamp"].as_str().unwrap().ends_with('Z'));

    assert_eq!(sink.find("data_fetch_failed")[0]["level"], "ERROR");
}

#[test]
fn base_keys_cannot_be_overridden() {
    let (logger, sink) = logger();
    logger.warn("m", json!({"level": "DEBUG", "service": "spoofed", "extra": 1}));

    let rec = &sink.records()[0];
    assert_eq!(rec["level"], "WARN");
    assert_eq!(rec["service"], "beacon-test");
    assert_eq!(rec["extra"], 1);
}

#[test]
fn non_object_fields_are_nested() {
    let (logger, sink) = logger();
    logger.debug("m", json!([1, 2]));
    logger.debug("n", serde_json::Value::Null);

    let recs = sink.records();
    assert_eq!(recs[0]["fields"], json!([1, 2]));
    assert!(recs[1].get("fields").is_none());
}

#[test]
fn records_below_min_level_are_dropped() {
    let (logger, sink) = logger();
    let logger = logger.with_min_level(Level::Warn);
    logger.debug("hidden", json!({}));
    logger.info("hidden", json!({}));
    logger.warn("shown", json!({}));
    logger.error("shown", json!({}));

    assert!(sink.find("hidden").is_empty());
    assert_eq!(sink.find("shown").len(), 2);
}
