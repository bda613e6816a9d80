//! Error types for webpub-sync.

use std::path::PathBuf;

use thiserror::Error;

use webpub_core::ConfigError;
use webpub_store::StoreError;

/// All errors that can arise from a publish run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from job configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An error from the remote store.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal failed while indexing the local tree.
    #[error("cannot index local folder: {0}")]
    Walk(#[from] walkdir::Error),

    /// The local folder to publish does not exist or is not a directory.
    #[error("local folder {0} does not exist or is not a directory")]
    FolderNotFound(PathBuf),

    /// A local path cannot be represented as a storage key.
    #[error("path {0} is not valid UTF-8")]
    NonUtf8Path(PathBuf),

    /// Two local files map to the same storage key.
    #[error("'{first}' and '{second}' both publish to storage key '{storage_key}'")]
    KeyCollision {
        storage_key: String,
        first: String,
        second: String,
    },

    /// The content container is missing on the remote side.
    #[error("the {0} container was not found")]
    ContainerNotFound(String),

    /// Remote index JSON could not be parsed or produced.
    #[error("remote index JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transfer tuning is unusable.
    #[error("invalid transfer limits: {0}")]
    Limits(String),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
