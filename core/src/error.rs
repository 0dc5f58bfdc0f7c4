//! Error types for the document search core.
//!
//! Every failure is returned to the caller as an explicit variant. Not-found is deliberately
//! coarse: a document that does not exist, has been deleted, or lies outside the requester's
//! scope all surface as [`GatewayError::NotFound`].

use thiserror::Error;

use crate::document::DocumentId;

/// Gateway result alias.
pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

/// Request rejected before it reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("search term must not be empty")]
    EmptyTerm,

    #[error("search term cannot be matched: {0}")]
    InvalidTerm(String),

    #[error("page must be 1 or greater, got {0}")]
    InvalidPage(usize),

    #[error("file name must not be empty")]
    EmptyFileName,

    #[error("file must be a PDF: {0}")]
    NotPdf(String),

    #[error("uploaded file is empty")]
    EmptyFile,

    #[error("file is too large: {size} bytes, maximum is {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    #[error("invalid date range: start is after end")]
    InvalidDateRange,
}

/// Storage backend failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("corrupt record for document {0}")]
    Corrupt(DocumentId),
}

/// Failure of the text-extraction collaborator.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to run extractor `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("extractor `{program}` exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("extracted text too short: {chars} characters, need at least {min}")]
    InsufficientText { chars: usize, min: usize },

    #[error("no extractor produced any text")]
    Empty,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("document not found")]
    NotFound,

    #[error("only the owner may delete this document")]
    Forbidden,

    #[error("processing error: {0}")]
    Processing(#[from] ExtractError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl GatewayError {
    /// Stable machine-readable code for API bodies.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Validation(ValidationError::FileTooLarge { .. }) => "FILE_TOO_LARGE",
            GatewayError::Validation(_) => "VALIDATION_ERROR",
            GatewayError::NotFound => "NOT_FOUND",
            GatewayError::Forbidden => "FORBIDDEN",
            GatewayError::Processing(_) => "PROCESSING_ERROR",
            GatewayError::Storage(_) => "STORAGE_ERROR",
        }
    }
}
