//! `/metrics`: Prometheus text exposition of the registry, outside the
//! instrumentation so scrapes do not count themselves.

use axum::extract::State;
use axum::http::{header, HeaderValue};
use axum::response::Response;

use crate::app_state::AppState;
use crate::response::{BufferedResponse, ResponseSink};

pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub async fn metrics(State(state): State<AppState>) -> Response {
    let text = state.registry().snapshot().render();

    let mut out = BufferedResponse::new();
    out.insert_header(
        header::CONTENT_TYPE,
        HeaderValue::from_static(PROMETHEUS_CONTENT_TYPE),
    );
    out.write(text.as_bytes());
    out.into_response()
}
