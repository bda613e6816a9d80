//! Domain types for a publish run.
//!
//! One [`Operation`] exists per distinct storage key that is present locally,
//! remotely, or both. Operations are created by the local indexer, classified
//! in place by the diff engine and then only read by the executor.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// What the executor should do with an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Not yet classified by the diff engine.
    #[default]
    Unclassified,
    /// Remote content already matches local content.
    Ignore,
    /// Local file has no remote counterpart.
    Upload,
    /// Local file differs from the remote copy.
    Update,
    /// Remote object has no local counterpart.
    Delete,
}

impl OperationKind {
    /// Kinds shown in run statistics, in display order.
    pub fn reported() -> &'static [OperationKind] {
        &[
            OperationKind::Delete,
            OperationKind::Update,
            OperationKind::Upload,
            OperationKind::Ignore,
        ]
    }

    /// Whether executing this kind touches the remote store.
    pub fn is_transfer(self) -> bool {
        matches!(
            self,
            OperationKind::Upload | OperationKind::Update | OperationKind::Delete
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Unclassified => write!(f, "unclassified"),
            OperationKind::Ignore => write!(f, "ignore"),
            OperationKind::Upload => write!(f, "upload"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// One intended action against the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OperationKind,
    /// Root-relative, `/`-separated path of the local file. For remote-only
    /// deletes this is the storage key.
    pub logical_name: String,
    /// Absolute local path; `None` for pure deletes.
    pub local_path: Option<PathBuf>,
    /// Object name inside the web container.
    pub storage_key: String,
    /// Lowercase hex SHA-256 of the local content, filled in lazily.
    pub content_hash: Option<String>,
    /// Byte length of the local file; 0 for deletes.
    pub size: u64,
}

impl Operation {
    /// An unclassified operation for a local file.
    pub fn local(
        logical_name: impl Into<String>,
        local_path: impl Into<PathBuf>,
        storage_key: impl Into<String>,
        size: u64,
    ) -> Self {
        Self {
            kind: OperationKind::Unclassified,
            logical_name: logical_name.into(),
            local_path: Some(local_path.into()),
            storage_key: storage_key.into(),
            content_hash: None,
            size,
        }
    }

    /// A delete for a remote object with no local counterpart.
    pub fn delete(storage_key: impl Into<String>) -> Self {
        let storage_key = storage_key.into();
        Self {
            kind: OperationKind::Delete,
            logical_name: storage_key.clone(),
            local_path: None,
            storage_key,
            content_hash: None,
            size: 0,
        }
    }
}
