//! Error-to-HTTP response conversion.
//!
//! Every failure is rendered in the same envelope as a successful conversion,
//! with an empty video list and a human-readable message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use stemdub_core::Error;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError(pub Error);

impl AppError {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Message shown to the caller. Validation messages are passed through
    /// without the error-kind prefix.
    pub fn message(&self) -> String {
        match &self.0 {
            Error::Validation(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "Server error in handler");
        }

        let body = json!({
            "videos": [],
            "error": self.message(),
        });

        (status, axum::Json(body)).into_response()
    }
}
