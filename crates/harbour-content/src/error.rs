use thiserror::Error;

/// Errors from blob storage operations.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content not found: {0}")]
    NotFound(String),

    #[error("size mismatch: declared {expected} bytes, got {actual}")]
    SizeMismatch { expected: i64, actual: u64 },

    #[error("hash mismatch: expected {expected}, computed {actual}")]
    HashMismatch { expected: String, actual: String },

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContentError {
    /// Whether the bytes themselves were rejected, as opposed to the store
    /// failing to handle them.
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::SizeMismatch { .. } | Self::HashMismatch { .. })
    }
}

/// Result alias for blob storage operations.
pub type ContentResult<T> = Result<T, ContentError>;
