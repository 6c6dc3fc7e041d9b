use harbour_types::TypeError;

/// Errors from metadata operations.
#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    /// Bad, missing or rejected credentials. Never says which factor failed.
    #[error("forbidden")]
    Unauthorized,

    #[error("object not found: {0}")]
    ObjectNotFound(String),

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    /// The operation is disabled under the active authentication mode.
    #[error("not implemented under directory authentication: {0}")]
    NotImplemented(&'static str),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The storage backend could not be reached or reported a fault.
    #[error("backend unavailable: {0}")]
    Backend(String),
}

impl MetaError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

impl From<TypeError> for MetaError {
    fn from(e: TypeError) -> Self {
        Self::InvalidRequest(e.to_string())
    }
}

/// Result alias for metadata operations.
pub type MetaResult<T> = Result<T, MetaError>;
