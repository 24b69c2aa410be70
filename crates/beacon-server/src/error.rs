//! Client-facing handler errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::response::{write_json, BufferedResponse, ResponseSink};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request body")]
    InvalidBody,

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    Downstream(&'static str),

    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidBody => StatusCode::BAD_REQUEST,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Downstream(_) | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 405 carries no body; everything else is `{"error": "..."}`.
    pub fn write_to(&self, out: &mut dyn ResponseSink) {
        match self {
            ApiError::MethodNotAllowed => out.set_status(self.status()),
            _ => write_json(out, self.status(), &json!({ "error": self.to_string() })),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut buf = BufferedResponse::new();
        self.write_to(&mut buf);
        buf.into_response()
    }
}
