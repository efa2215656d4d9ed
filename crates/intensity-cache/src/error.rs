//! Error types for cache stores.

use thiserror::Error;

/// Errors raised by a [`CacheStore`](crate::CacheStore) backend.
///
/// These never reach the statistics engine: the intensity cache logs them and
/// degrades to a miss (on read) or drops the write.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem error from a disk-backed store.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be decoded.
    #[error("corrupt cache entry for {key}: {message}")]
    Corrupt { key: String, message: String },

    /// The store could not be opened.
    #[error("failed to open store: {0}")]
    OpenFailed(String),
}

impl StoreError {
    /// Create a Corrupt error.
    pub fn corrupt(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl From<tempfile::PersistError> for StoreError {
    fn from(err: tempfile::PersistError) -> Self {
        Self::Io(err.error)
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
