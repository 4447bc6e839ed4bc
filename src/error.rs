use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScoutError>;

#[derive(Debug, Error)]
pub enum ScoutError {
    /// Network or markup failure while collecting. Recovered from by the
    /// player cache, never handed to facade callers.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A persisted document could not be decoded. Loaders reset to defaults.
    #[error("storage corrupt: {0}")]
    StorageCorrupt(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
