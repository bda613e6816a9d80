//! Local tree indexing.
//!
//! Walks the publish folder and produces one unclassified [`Operation`] per
//! regular file. Hashes are not computed here; the diff engine hashes only
//! the files it needs to compare or upload.

use std::collections::HashMap;
use std::path::{Component, Path};

use walkdir::WalkDir;

use webpub_core::{JobConfig, Operation};

use crate::error::SyncError;

/// Index every regular file under `config.folder_name`.
///
/// Symbolic links are followed and published under the link's own name.
/// Results are ordered by path so runs are reproducible.
pub fn index_local_tree(config: &JobConfig) -> Result<Vec<Operation>, SyncError> {
    let root = config.folder_name.as_path();
    if !root.is_dir() {
        return Err(SyncError::FolderNotFound(root.to_path_buf()));
    }

    let mut operations = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let logical_name = logical_name(root, path)?;
        let storage_key = storage_key(config, &logical_name);
        let size = entry.metadata()?.len();
        tracing::debug!("indexed {logical_name} -> {storage_key} ({size} bytes)");
        operations.push(Operation::local(logical_name, path, storage_key, size));
    }

    let total: u64 = operations.iter().map(|op| op.size).sum();
    tracing::info!(
        "indexed {} local file(s), {} bytes under {}",
        operations.len(),
        total,
        root.display()
    );
    Ok(operations)
}

/// Root-relative path of `path` joined with `/`.
pub fn logical_name(root: &Path, path: &Path) -> Result<String, SyncError> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut segments = Vec::new();
    for component in relative.components() {
        if let Component::Normal(segment) = component {
            let segment = segment
                .to_str()
                .ok_or_else(|| SyncError::NonUtf8Path(path.to_path_buf()))?;
            segments.push(segment);
        }
    }
    Ok(segments.join("/"))
}

/// Storage key for a logical name.
///
/// Strips a configured extension unless the file is the index document, then
/// lowercases when `convertToLowercase` is set.
pub fn storage_key(config: &JobConfig, logical_name: &str) -> String {
    let file_name = logical_name.rsplit('/').next().unwrap_or(logical_name);
    let extension = Path::new(file_name).extension().and_then(|e| e.to_str());

    let key = match extension {
        Some(ext) if !config.is_index_file(file_name) && config.strips_extension(ext) => {
            &logical_name[..logical_name.len() - ext.len() - 1]
        }
        _ => logical_name,
    };

    if config.convert_to_lowercase {
        key.to_lowercase()
    } else {
        key.to_string()
    }
}

/// Fail when two local files would be published under the same key.
pub fn ensure_unique_keys(operations: &[Operation]) -> Result<(), SyncError> {
    let mut seen: HashMap<&str, &str> = HashMap::with_capacity(operations.len());
    for op in operations {
        if let Some(first) = seen.insert(&op.storage_key, &op.logical_name) {
            return Err(SyncError::KeyCollision {
                storage_key: op.storage_key.clone(),
                first: first.to_string(),
                second: op.logical_name.clone(),
            });
        }
    }
    Ok(())
}
