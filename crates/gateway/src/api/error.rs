//! Uniform JSON error envelope for the HTTP boundary.
//!
//! Wraps the shared `sa_domain::Error` so every handler can return
//! `Result<_, ApiError>` and get the same `{"error": "..."}` body and
//! status-code mapping, instead of each route hand-rolling a response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

pub struct ApiError(pub sa_domain::Error);

impl From<sa_domain::Error> for ApiError {
    fn from(err: sa_domain::Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}
