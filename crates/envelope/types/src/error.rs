//! Error taxonomy shared by every envelope operation.

use thiserror::Error;

/// Result type alias for envelope operations
pub type SigningResult<T> = Result<T, SigningError>;

/// Errors surfaced by the signing core.
///
/// `NotFound`, `Expired`, `Forbidden`, `Conflict` and `Validation` go straight
/// back to the caller. `RenderFailure` is only ever seen by operators: the
/// render queue absorbs it and retries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SigningError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("expired: {0}")]
    Expired(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("incomplete layout: {0}")]
    IncompleteLayout(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("render failure: {0}")]
    RenderFailure(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl SigningError {
    /// Stable machine-readable code for transport layers.
    pub fn code(&self) -> &'static str {
        match self {
            SigningError::NotFound(_) => "not_found",
            SigningError::Expired(_) => "expired",
            SigningError::Forbidden(_) => "forbidden",
            SigningError::Conflict(_) => "conflict",
            SigningError::IncompleteLayout(_) => "incomplete_layout",
            SigningError::Validation(_) => "validation_error",
            SigningError::RenderFailure(_) => "render_failure",
            SigningError::Storage(_) => "storage_error",
        }
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        SigningError::NotFound(what.to_string())
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        SigningError::Conflict(reason.into())
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        SigningError::Forbidden(reason.into())
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        SigningError::Validation(reason.into())
    }
}
