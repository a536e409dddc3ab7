use envelope_types::SigningError;
use thiserror::Error;

/// Errors raised while producing a rendered document.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("source document is not a usable PDF: {0}")]
    InvalidDocument(String),

    #[error("signature image could not be decoded: {0}")]
    InvalidImage(String),

    #[error("field references page {page} but the document has {pages} pages")]
    PageOutOfRange { page: u32, pages: u32 },

    #[error("signature record {0} was not supplied")]
    MissingSignature(String),

    #[error("pdf error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RenderResult<T> = Result<T, RenderError>;

impl From<RenderError> for SigningError {
    fn from(err: RenderError) -> Self {
        SigningError::RenderFailure(err.to_string())
    }
}
