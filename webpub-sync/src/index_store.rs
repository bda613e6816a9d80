//! Remote index: the persisted `storage key -> content hash` record.
//!
//! The index lives as a single JSON object in the system container. It is
//! read directly from the store and written back through the [`Executor`] so
//! a failed save is retried and tallied like any other operation.

use std::collections::BTreeMap;

use webpub_core::{Operation, OperationKind};
use webpub_store::{BlobStore, StoreError};

use crate::error::SyncError;
use crate::executor::{Executor, OperationOutcome};
use crate::hasher::hash_bytes;
use crate::observer::ProgressObserver;

/// Storage key to lowercase hex SHA-256, as of the last run.
pub type RemoteIndex = BTreeMap<String, String>;

/// Content type the index object is stored with.
pub const INDEX_CONTENT_TYPE: &str = "application/json";

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

pub fn serialize(index: &RemoteIndex) -> Result<Vec<u8>, SyncError> {
    Ok(serde_json::to_vec_pretty(index)?)
}

/// Parse an index document. A leading UTF-8 byte-order mark is ignored;
/// any other invalid UTF-8 is an error.
pub fn deserialize(bytes: &[u8]) -> Result<RemoteIndex, SyncError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(RemoteIndex::new());
    }
    Ok(serde_json::from_slice(bytes)?)
}

/// Load the index named `name` from `container`.
///
/// A missing object or container yields an empty index (first run).
pub fn load(store: &dyn BlobStore, container: &str, name: &str) -> Result<RemoteIndex, SyncError> {
    let bytes = match store.get_blob(container, name) {
        Ok(Some(bytes)) => bytes,
        Ok(None) | Err(StoreError::ContainerNotFound(_)) => {
            tracing::info!("no remote index at {container}/{name}; treating as first run");
            return Ok(RemoteIndex::new());
        }
        Err(err) => return Err(err.into()),
    };
    let index = deserialize(&bytes)?;
    tracing::info!("loaded remote index with {} entries", index.len());
    Ok(index)
}

/// Persist `index` as `container/name`, replacing any previous version.
///
/// Returns the pseudo-operation that stands for the save together with its
/// outcome so the caller can tally it.
pub fn save(
    executor: &Executor<'_>,
    container: &str,
    name: &str,
    index: &RemoteIndex,
    observer: &mut dyn ProgressObserver,
) -> Result<(Operation, OperationOutcome), SyncError> {
    let bytes = serialize(index)?;
    let operation = Operation {
        kind: OperationKind::Upload,
        logical_name: name.to_string(),
        local_path: None,
        storage_key: name.to_string(),
        content_hash: Some(hash_bytes(&bytes)),
        size: bytes.len() as u64,
    };
    let outcome = executor.upload_bytes(container, &operation, &bytes, INDEX_CONTENT_TYPE, observer);
    match &outcome {
        OperationOutcome::Failed { error, .. } => {
            tracing::warn!("saving remote index {container}/{name} failed: {error}")
        }
        _ => tracing::info!(
            "saved remote index {container}/{name} with {} entries",
            index.len()
        ),
    }
    Ok((operation, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use webpub_store::MemoryStore;

    #[test]
    fn missing_object_loads_empty() {
        let store = MemoryStore::with_containers(["xml4web"]);
        assert!(load(&store, "xml4web", "storage-index.json")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn missing_container_loads_empty() {
        let store = MemoryStore::new();
        assert!(load(&store, "xml4web", "storage-index.json")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn byte_order_mark_is_skipped() {
        let mut bytes = "\u{feff}".as_bytes().to_vec();
        bytes.extend_from_slice(br#"{"about": "ABCDEF"}"#);
        let index = deserialize(&bytes).unwrap();
        assert_eq!(index.get("about").map(String::as_str), Some("ABCDEF"));
    }

    #[test]
    fn invalid_utf8_is_an_error_not_a_replacement() {
        let err = deserialize(b"{\"caf\xe9\": \"ABCDEF\"}").unwrap_err();
        assert!(matches!(err, SyncError::Json(_)), "got: {err}");
    }

    #[test]
    fn byte_order_mark_alone_is_an_empty_index() {
        assert!(deserialize(b"\xef\xbb\xbf \n").unwrap().is_empty());
    }

    #[test]
    fn serialized_index_is_a_flat_json_object() {
        let index = RemoteIndex::from([
            ("a.txt".to_string(), "11".to_string()),
            ("blog/post".to_string(), "22".to_string()),
        ]);
        let value: serde_json::Value = serde_json::from_slice(&serialize(&index).unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ "a.txt": "11", "blog/post": "22" })
        );
        assert_eq!(deserialize(&serialize(&index).unwrap()).unwrap(), index);
    }

    #[test]
    fn corrupt_index_is_an_error() {
        let store = MemoryStore::with_containers(["xml4web"]);
        store
            .put_blob(
                "xml4web",
                "storage-index.json",
                b"[not an object",
                &webpub_store::BlobProperties::new(INDEX_CONTENT_TYPE),
            )
            .unwrap();
        let err = load(&store, "xml4web", "storage-index.json").unwrap_err();
        assert!(matches!(err, SyncError::Json(_)), "got: {err}");
    }
}
