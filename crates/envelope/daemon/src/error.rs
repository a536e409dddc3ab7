//! Error types for envelopd

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use envelope_types::SigningError;
use serde::Serialize;
use thiserror::Error;

/// Daemon-level errors
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server startup error
    #[error("Server error: {0}")]
    Server(String),

    /// Service construction error
    #[error("Service error: {0}")]
    Service(#[from] SigningError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API-specific errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// The caller did not identify a tenant actor
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Malformed request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Error from the signing core
    #[error(transparent)]
    Signing(#[from] SigningError),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Signing(e) => {
                let status = match e {
                    SigningError::NotFound(_) => StatusCode::NOT_FOUND,
                    SigningError::Expired(_) => StatusCode::GONE,
                    SigningError::Forbidden(_) => StatusCode::FORBIDDEN,
                    SigningError::Conflict(_) => StatusCode::CONFLICT,
                    SigningError::IncompleteLayout(_) | SigningError::Validation(_) => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                    SigningError::RenderFailure(_) | SigningError::Storage(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, e.code())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for daemon operations
pub type DaemonResult<T> = Result<T, DaemonError>;
