//! Handler-facing response sink.
//!
//! Handlers write status, headers and body through [`ResponseSink`] rather
//! than returning a response value, so a decorator (the status recorder) can
//! sit between the handler and the buffer that becomes the HTTP response.
//!
//! Commit rules follow the usual writer semantics: the first status wins, a
//! body write without a prior status commits 200, and headers inserted after
//! the commit are ignored.

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use bytes::BytesMut;
use serde::Serialize;

pub trait ResponseSink: Send {
    fn set_status(&mut self, status: StatusCode);
    fn insert_header(&mut self, name: HeaderName, value: HeaderValue);
    fn write(&mut self, chunk: &[u8]);
}

/// In-memory response that is turned into an axum `Response` once the handler returns.
#[derive(Debug, Default)]
pub struct BufferedResponse {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: BytesMut,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status that will go on the wire.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_response(self) -> Response {
        let status = self.status();
        let mut res = Response::new(Body::from(self.body.freeze()));
        *res.status_mut() = status;
        *res.headers_mut() = self.headers;
        res
    }
}

impl ResponseSink for BufferedResponse {
    fn set_status(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        if self.status.is_none() {
            self.headers.insert(name, value);
        }
    }

    fn write(&mut self, chunk: &[u8]) {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.body.extend_from_slice(chunk);
    }
}

/// Write `body` as a JSON response with `status`.
pub fn write_json<T: Serialize>(out: &mut dyn ResponseSink, status: StatusCode, body: &T) {
    match serde_json::to_vec(body) {
        Ok(bytes) => {
            out.insert_header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            out.set_status(status);
            out.write(&bytes);
        }
        Err(e) => {
            tracing::error!(error = %e, "response serialization failed");
            out.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_write_commits_default_status() {
        let mut res = BufferedResponse::new();
        res.write(b"hi");
        res.set_status(StatusCode::NOT_FOUND);
        res.insert_header(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().is_empty());
        assert_eq!(res.body(), b"hi");
    }

    #[test]
    fn first_status_wins() {
        let mut res = BufferedResponse::new();
        res.set_status(StatusCode::ACCEPTED);
        res.set_status(StatusCode::CONFLICT);
        assert_eq!(res.into_response().status(), StatusCode::ACCEPTED);
    }
}
