//! Error types for webpub-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while loading or validating a job configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read job configuration at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parse error on load — includes file path and line context from serde_json.
    #[error("failed to parse job configuration at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A cache-control rule pattern is not a valid regular expression.
    #[error("invalid cache-control pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A value is present but unusable.
    #[error("config validation error: {0}")]
    Validation(String),
}
