//! # webpub-store
//!
//! Remote object storage behind a small blocking [`BlobStore`] trait.
//!
//! Backends:
//! - [`AzureBlobStore`] — Azure Blob Storage REST API (Shared Key or SAS auth)
//! - [`LocalFolderStore`] — containers as directories on the local disk
//! - [`MemoryStore`] — in-process store for tests and dry runs
//!
//! Pick one from a connection string with [`StorageConnection::parse`] and
//! [`StorageConnection::open`].

pub mod azure;
pub mod blob;
pub mod connection;
pub mod error;
pub mod local;
pub mod memory;

pub use azure::{AzureAccount, AzureBlobStore, Credentials};
pub use blob::{BlobProperties, BlobStore, BlockId};
pub use connection::StorageConnection;
pub use error::StoreError;
pub use local::LocalFolderStore;
pub use memory::{MemoryStore, StoredBlob};
