use envelope_types::SigningError;
use thiserror::Error;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger-layer errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<LedgerError> for SigningError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(what) => SigningError::NotFound(what),
            LedgerError::Conflict(reason) => SigningError::Conflict(reason),
            LedgerError::InvalidInput(reason) => SigningError::Validation(reason),
            LedgerError::Serialization(reason) | LedgerError::Backend(reason) => {
                SigningError::Storage(reason)
            }
        }
    }
}
