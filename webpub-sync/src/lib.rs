//! # webpub-sync
//!
//! Publish a local directory tree to a remote blob store.
//!
//! A run indexes the local tree ([`indexer`]), loads the remote index left by
//! the previous run ([`index_store`]), classifies every path ([`diff`]),
//! executes uploads, updates and deletes with chunking and retry
//! ([`executor`], [`retry`]), then persists a fresh remote index built from
//! what succeeded ([`report`]). [`pipeline::run`] ties the steps together.

pub mod diff;
pub mod error;
pub mod executor;
pub mod hasher;
pub mod index_store;
pub mod indexer;
pub mod observer;
pub mod pipeline;
pub mod report;
pub mod retry;

pub use error::SyncError;
pub use executor::{Executor, OperationOutcome, TransferLimits};
pub use index_store::RemoteIndex;
pub use observer::{NoopObserver, ProgressObserver};
pub use pipeline::{run, run_with_store, PublishOptions, PublishReport};
pub use report::{RunSummary, Statistics};
