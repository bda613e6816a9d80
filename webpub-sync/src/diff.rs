//! Reconcile the local tree against the remote index.
//!
//! Every local operation ends up as exactly one of `Ignore`, `Update` or
//! `Upload`; every index entry without a local file becomes a `Delete`.

use std::collections::HashMap;

use webpub_core::{Operation, OperationKind};

use crate::error::SyncError;
use crate::hasher::{hash_file, hashes_match};
use crate::index_store::RemoteIndex;

/// Classify `operations` in place and append deletes for remote-only keys.
///
/// Files are hashed only when they match an index entry or are new uploads.
/// A file that cannot be read fails the whole run.
pub fn reconcile(operations: &mut Vec<Operation>, index: &RemoteIndex) -> Result<(), SyncError> {
    let by_key: HashMap<String, usize> = operations
        .iter()
        .enumerate()
        .map(|(i, op)| (op.storage_key.clone(), i))
        .collect();

    let mut deletes = Vec::new();
    for (storage_key, remote_hash) in index {
        let Some(&i) = by_key.get(storage_key) else {
            tracing::debug!("{storage_key}: delete (not present locally)");
            deletes.push(Operation::delete(storage_key.clone()));
            continue;
        };
        let op = &mut operations[i];
        let local_hash = ensure_hash(op)?;
        op.kind = if hashes_match(&local_hash, remote_hash) {
            OperationKind::Ignore
        } else {
            OperationKind::Update
        };
        tracing::debug!("{}: {}", op.storage_key, op.kind);
    }

    for op in operations
        .iter_mut()
        .filter(|op| op.kind == OperationKind::Unclassified)
    {
        ensure_hash(op)?;
        op.kind = OperationKind::Upload;
        tracing::debug!("{}: {}", op.storage_key, op.kind);
    }

    operations.extend(deletes);
    Ok(())
}

fn ensure_hash(op: &mut Operation) -> Result<String, SyncError> {
    if let Some(hash) = &op.content_hash {
        return Ok(hash.clone());
    }
    let Some(path) = &op.local_path else {
        return Err(SyncError::Io {
            path: op.logical_name.clone().into(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "operation has no local file to hash",
            ),
        });
    };
    let hash = hash_file(path)?;
    op.content_hash = Some(hash.clone());
    Ok(hash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::hash_bytes;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn local(root: &Path, name: &str, content: &str) -> Operation {
        let path = root.join(name);
        fs::write(&path, content).expect("write");
        Operation::local(name, path, name, content.len() as u64)
    }

    fn kinds(ops: &[Operation]) -> Vec<(&str, OperationKind)> {
        ops.iter()
            .map(|op| (op.storage_key.as_str(), op.kind))
            .collect()
    }

    #[test]
    fn empty_index_uploads_everything() {
        let tmp = TempDir::new().expect("tmp");
        let mut ops = vec![local(tmp.path(), "a.txt", "content")];
        reconcile(&mut ops, &RemoteIndex::new()).expect("reconcile");

        assert_eq!(kinds(&ops), [("a.txt", OperationKind::Upload)]);
        assert_eq!(ops[0].content_hash.as_deref(), Some(hash_bytes(b"content").as_str()));
    }

    #[test]
    fn classifies_every_case() {
        let tmp = TempDir::new().expect("tmp");
        let mut ops = vec![
            local(tmp.path(), "changed.css", "new"),
            local(tmp.path(), "fresh.js", "fresh"),
            local(tmp.path(), "same.txt", "same"),
        ];
        let index = RemoteIndex::from([
            ("changed.css".to_string(), hash_bytes(b"old")),
            ("old.html".to_string(), "deadbeef".to_string()),
            ("same.txt".to_string(), hash_bytes(b"same").to_uppercase()),
        ]);

        reconcile(&mut ops, &index).expect("reconcile");

        assert_eq!(
            kinds(&ops),
            [
                ("changed.css", OperationKind::Update),
                ("fresh.js", OperationKind::Upload),
                ("same.txt", OperationKind::Ignore),
                ("old.html", OperationKind::Delete),
            ]
        );
        let delete = &ops[3];
        assert!(delete.local_path.is_none());
        assert!(delete.content_hash.is_none());
        assert!(ops.iter().all(|op| op.kind != OperationKind::Unclassified));
    }

    #[test]
    fn unreadable_file_is_fatal() {
        let tmp = TempDir::new().expect("tmp");
        let mut ops = vec![Operation::local(
            "gone.txt",
            tmp.path().join("gone.txt"),
            "gone.txt",
            0,
        )];
        let err = reconcile(&mut ops, &RemoteIndex::new()).unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }), "got: {err}");
    }

    #[test]
    fn matches_index_by_storage_key() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("about.html");
        fs::write(&path, "about").expect("write");
        let mut ops = vec![Operation::local("about.html", path, "about", 5)];
        let index = RemoteIndex::from([("about".to_string(), hash_bytes(b"about"))]);

        reconcile(&mut ops, &index).expect("reconcile");
        assert_eq!(kinds(&ops), [("about", OperationKind::Ignore)]);
    }
}
