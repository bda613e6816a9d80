//! [`BlobStore`] over a plain directory.
//!
//! ## Layout
//!
//! ```text
//! <root>/
//!   <container>/<key>                     committed object bytes
//!   .webpub/props/<container>/<key>.json  BlobProperties sidecar
//!   .webpub/blocks/<container>/<key>/<n>  staged blocks, hex-named
//! ```
//!
//! Object writes use the `.tmp` + rename pattern so a reader never sees a
//! half-written object. A key that is both an object and a prefix of other
//! keys (`about` and `about/team`) cannot be represented and fails with an
//! I/O error. Keys with `.` or `..` segments are rejected so a tampered
//! index cannot reach outside the store root.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use crate::blob::{BlobProperties, BlobStore, BlockId};
use crate::error::{io_err, StoreError};

const META_DIR: &str = ".webpub";

/// Store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalFolderStore {
    root: PathBuf,
}

impl LocalFolderStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Properties recorded for an object, if it exists.
    pub fn properties(&self, container: &str, key: &str) -> Result<Option<BlobProperties>, StoreError> {
        let path = self.props_path(container, key)?;
        match fs::read_to_string(&path) {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_err(path, err)),
        }
    }

    fn container_path(&self, container: &str) -> PathBuf {
        self.root.join(container)
    }

    fn blob_path(&self, container: &str, key: &str) -> Result<PathBuf, StoreError> {
        join_key(&self.container_path(container), key)
    }

    fn props_path(&self, container: &str, key: &str) -> Result<PathBuf, StoreError> {
        let base = self.root.join(META_DIR).join("props").join(container);
        let mut path = join_key(&base, key)?;
        path.as_mut_os_string().push(".json");
        Ok(path)
    }

    fn blocks_dir(&self, container: &str, key: &str) -> Result<PathBuf, StoreError> {
        let base = self.root.join(META_DIR).join("blocks").join(container);
        join_key(&base, key)
    }

    fn require_container(&self, container: &str) -> Result<(), StoreError> {
        if self.container_path(container).is_dir() {
            Ok(())
        } else {
            Err(StoreError::ContainerNotFound(container.to_string()))
        }
    }

    fn commit(
        &self,
        container: &str,
        key: &str,
        data: &[u8],
        properties: &BlobProperties,
    ) -> Result<(), StoreError> {
        atomic_write(&self.blob_path(container, key)?, data)?;
        let json = serde_json::to_vec_pretty(properties)?;
        atomic_write(&self.props_path(container, key)?, &json)
    }
}

/// Join a `/`-separated key onto a directory, one component at a time.
///
/// Empty segments are skipped. Every other segment must be a plain name.
fn join_key(base: &Path, key: &str) -> Result<PathBuf, StoreError> {
    let mut path = base.to_path_buf();
    let mut depth = 0;
    for segment in key.split('/').filter(|segment| !segment.is_empty()) {
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => path.push(segment),
            _ => return Err(StoreError::InvalidKey(key.to_string())),
        }
        depth += 1;
    }
    if depth == 0 {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(path)
}

fn block_file_name(block_id: &BlockId) -> String {
    hex::encode(block_id.as_str())
}

/// Write to `<path>.tmp` then rename onto `path`.
fn atomic_write(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp = PathBuf::from(format!("{}.tmp", path.display()));
    fs::write(&tmp, data).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<bool, StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(io_err(path, err)),
    }
}

impl BlobStore for LocalFolderStore {
    fn container_exists(&self, container: &str) -> Result<bool, StoreError> {
        Ok(self.container_path(container).is_dir())
    }

    fn create_container_if_missing(&self, container: &str) -> Result<(), StoreError> {
        let path = self.container_path(container);
        fs::create_dir_all(&path).map_err(|e| io_err(path, e))
    }

    fn get_blob(&self, container: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.require_container(container)?;
        let path = self.blob_path(container, key)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_err(path, err)),
        }
    }

    fn put_blob(
        &self,
        container: &str,
        key: &str,
        data: &[u8],
        properties: &BlobProperties,
    ) -> Result<(), StoreError> {
        self.require_container(container)?;
        self.commit(container, key, data, properties)
    }

    fn put_block(
        &self,
        container: &str,
        key: &str,
        block_id: &BlockId,
        data: &[u8],
    ) -> Result<(), StoreError> {
        self.require_container(container)?;
        let path = self.blocks_dir(container, key)?.join(block_file_name(block_id));
        atomic_write(&path, data)
    }

    fn put_block_list(
        &self,
        container: &str,
        key: &str,
        block_ids: &[BlockId],
        properties: &BlobProperties,
    ) -> Result<(), StoreError> {
        self.require_container(container)?;
        let blocks_dir = self.blocks_dir(container, key)?;
        let target = self.blob_path(container, key)?;
        let assembled = PathBuf::from(format!("{}.blocks.tmp", target.display()));
        if let Some(parent) = assembled.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }

        let mut out = fs::File::create(&assembled).map_err(|e| io_err(&assembled, e))?;
        for block_id in block_ids {
            let block_path = blocks_dir.join(block_file_name(block_id));
            let block = match fs::read(&block_path) {
                Ok(block) => block,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    drop(out);
                    let _ = fs::remove_file(&assembled);
                    return Err(StoreError::BlockNotFound {
                        key: key.to_string(),
                        block_id: block_id.to_string(),
                    });
                }
                Err(err) => return Err(io_err(block_path, err)),
            };
            out.write_all(&block).map_err(|e| io_err(&assembled, e))?;
        }
        out.sync_all().map_err(|e| io_err(&assembled, e))?;
        drop(out);

        if let Err(e) = fs::rename(&assembled, &target) {
            let _ = fs::remove_file(&assembled);
            return Err(io_err(target, e));
        }
        let json = serde_json::to_vec_pretty(properties)?;
        atomic_write(&self.props_path(container, key)?, &json)?;

        match fs::remove_dir_all(&blocks_dir) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => tracing::warn!("could not clear staged blocks {}: {err}", blocks_dir.display()),
        }
        tracing::debug!("committed {} block(s) to {container}/{key}", block_ids.len());
        Ok(())
    }

    fn delete_blob(&self, container: &str, key: &str) -> Result<bool, StoreError> {
        self.require_container(container)?;
        let existed = remove_if_present(&self.blob_path(container, key)?)?;
        remove_if_present(&self.props_path(container, key)?)?;
        Ok(existed)
    }
}
