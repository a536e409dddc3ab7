use envelope_types::SigningError;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage-layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<StorageError> for SigningError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => SigningError::NotFound(what),
            StorageError::Conflict(reason) => SigningError::Conflict(reason),
            StorageError::InvalidInput(reason) => SigningError::Validation(reason),
            StorageError::Io(e) => SigningError::Storage(e.to_string()),
            StorageError::Backend(reason) => SigningError::Storage(reason),
        }
    }
}
