//! Status-capturing decorator around a [`ResponseSink`].

use axum::http::{HeaderName, HeaderValue, StatusCode};

use crate::response::ResponseSink;

/// Records the status a handler chose while forwarding every call untouched.
///
/// Exactly one status is recorded: the first explicit `set_status`, or 200 if
/// the handler never set one (or wrote body bytes first).
#[derive(Debug)]
pub struct ResponseRecorder<S> {
    inner: S,
    recorded: Option<StatusCode>,
    committed: bool,
}

impl<S: ResponseSink> ResponseRecorder<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            recorded: None,
            committed: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.recorded.unwrap_or(StatusCode::OK)
    }

    /// Whether the handler set a status explicitly.
    pub fn is_explicit(&self) -> bool {
        self.recorded.is_some()
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: ResponseSink> ResponseSink for ResponseRecorder<S> {
    fn set_status(&mut self, status: StatusCode) {
        if !self.committed {
            self.recorded = Some(status);
            self.committed = true;
        }
        self.inner.set_status(status);
    }

    fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.inner.insert_header(name, value);
    }

    fn write(&mut self, chunk: &[u8]) {
        self.committed = true;
        self.inner.write(chunk);
    }
}
