//! Error types for the API layer.
//!
//! [`ApiError`] converts into an Axum response with a JSON body of the
//! form `{"error": "...", "status": 404}`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use signalgrid_core::SignalError;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested signal does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was malformed or out of range.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The backing store is unavailable; the request can be retried.
    #[error("unavailable: {0}")]
    Unavailable(String),
}

impl From<SignalError> for ApiError {
    fn from(err: SignalError) -> Self {
        match err {
            SignalError::NotFound(id) => Self::NotFound(format!("signal {id}")),
            SignalError::InvalidInput(msg) => Self::InvalidInput(msg),
            SignalError::Transient(msg) => Self::Unavailable(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidInput(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use signalgrid_types::SignalId;

    use super::*;

    #[test]
    fn signal_errors_map_to_statuses() {
        let cases = [
            (
                SignalError::NotFound(SignalId::new(3)),
                StatusCode::NOT_FOUND,
            ),
            (
                SignalError::InvalidInput("green_time must be positive".to_owned()),
                StatusCode::BAD_REQUEST,
            ),
            (
                SignalError::Transient("pool timed out".to_owned()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, expected) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
