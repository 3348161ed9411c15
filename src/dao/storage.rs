use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or failed.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// What failed.
        message: String,
        /// Underlying error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The batch was rejected before reaching the backend.
    #[error("invalid write batch: {0}")]
    InvalidBatch(String),
    /// A concurrent writer modified the target documents while the batch was applied.
    #[error("write conflict on `{path}`")]
    Conflict {
        /// Document path involved.
        path: String,
    },
    /// A stored document could not be decoded into the expected model.
    #[error("corrupted document at `{path}`")]
    Corrupted {
        /// Document path involved.
        path: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
