//! webpub core library — publish job configuration, operation types, errors.
//!
//! Public API surface:
//! - [`types`] — [`Operation`] and [`OperationKind`], the unit of work
//! - [`config`] — [`JobConfig`] loading, validation and lookup tables
//! - [`error`] — [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{CacheControlRules, ContentTypeMap, JobConfig};
pub use error::ConfigError;
pub use types::{Operation, OperationKind};
