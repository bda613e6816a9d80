//! Error types for webpub-store.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from remote store calls.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The service answered with a non-success status.
    #[error("{method} {resource} failed with HTTP {status}: {message}")]
    Http {
        method: &'static str,
        resource: String,
        status: u16,
        message: String,
    },

    /// The request never produced a response (DNS, TLS, connection reset...).
    #[error("transport error for {resource}: {message}")]
    Transport { resource: String, message: String },

    /// The connection string is malformed or incomplete.
    #[error("invalid storage connection string: {0}")]
    ConnectionString(String),

    /// The target container does not exist.
    #[error("container '{0}' not found")]
    ContainerNotFound(String),

    /// A key segment would resolve outside its container (`.`, `..`, a drive
    /// prefix) or the key names no object at all.
    #[error("invalid blob key '{0}'")]
    InvalidKey(String),

    /// A block list referenced a block that was never staged.
    #[error("block {block_id} was not staged for {key}")]
    BlockNotFound { key: String, block_id: String },

    /// Blob property sidecar (local folder store) could not be (de)serialized.
    #[error("blob properties JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// HTTP status of a service error, if this is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            StoreError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Convenience constructor for [`StoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.into(),
        source,
    }
}
