//! In-process [`BlobStore`] backed by hash maps.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::blob::{BlobProperties, BlobStore, BlockId};
use crate::error::StoreError;

/// A committed object held by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub data: Vec<u8>,
    pub properties: BlobProperties,
}

#[derive(Debug, Default)]
struct State {
    containers: BTreeSet<String>,
    blobs: BTreeMap<(String, String), StoredBlob>,
    staged: HashMap<(String, String), HashMap<BlockId, Vec<u8>>>,
}

/// Store that keeps everything in memory; contents vanish on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with the given containers already created.
    pub fn with_containers<I, S>(containers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        store
            .lock()
            .containers
            .extend(containers.into_iter().map(Into::into));
        store
    }

    /// Snapshot of one committed object.
    pub fn blob(&self, container: &str, key: &str) -> Option<StoredBlob> {
        self.lock()
            .blobs
            .get(&(container.to_string(), key.to_string()))
            .cloned()
    }

    /// Keys of every committed object in `container`, sorted.
    pub fn keys(&self, container: &str) -> Vec<String> {
        self.lock()
            .blobs
            .keys()
            .filter(|(c, _)| c == container)
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Number of blocks staged but not yet committed for an object.
    pub fn staged_block_count(&self, container: &str, key: &str) -> usize {
        self.lock()
            .staged
            .get(&(container.to_string(), key.to_string()))
            .map_or(0, HashMap::len)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Every mutation is a single map call, so a poisoned state is still consistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn require_container(state: &State, container: &str) -> Result<(), StoreError> {
    if state.containers.contains(container) {
        Ok(())
    } else {
        Err(StoreError::ContainerNotFound(container.to_string()))
    }
}

impl BlobStore for MemoryStore {
    fn container_exists(&self, container: &str) -> Result<bool, StoreError> {
        Ok(self.lock().containers.contains(container))
    }

    fn create_container_if_missing(&self, container: &str) -> Result<(), StoreError> {
        self.lock().containers.insert(container.to_string());
        Ok(())
    }

    fn get_blob(&self, container: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let state = self.lock();
        require_container(&state, container)?;
        Ok(state
            .blobs
            .get(&(container.to_string(), key.to_string()))
            .map(|b| b.data.clone()))
    }

    fn put_blob(
        &self,
        container: &str,
        key: &str,
        data: &[u8],
        properties: &BlobProperties,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        require_container(&state, container)?;
        state.blobs.insert(
            (container.to_string(), key.to_string()),
            StoredBlob {
                data: data.to_vec(),
                properties: properties.clone(),
            },
        );
        Ok(())
    }

    fn put_block(
        &self,
        container: &str,
        key: &str,
        block_id: &BlockId,
        data: &[u8],
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        require_container(&state, container)?;
        state
            .staged
            .entry((container.to_string(), key.to_string()))
            .or_default()
            .insert(block_id.clone(), data.to_vec());
        Ok(())
    }

    fn put_block_list(
        &self,
        container: &str,
        key: &str,
        block_ids: &[BlockId],
        properties: &BlobProperties,
    ) -> Result<(), StoreError> {
        let mut state = self.lock();
        require_container(&state, container)?;
        let id = (container.to_string(), key.to_string());
        let staged = state.staged.remove(&id).unwrap_or_default();

        let mut data = Vec::new();
        for block_id in block_ids {
            let Some(block) = staged.get(block_id) else {
                return Err(StoreError::BlockNotFound {
                    key: key.to_string(),
                    block_id: block_id.to_string(),
                });
            };
            data.extend_from_slice(block);
        }

        state.blobs.insert(
            id,
            StoredBlob {
                data,
                properties: properties.clone(),
            },
        );
        Ok(())
    }

    fn delete_blob(&self, container: &str, key: &str) -> Result<bool, StoreError> {
        let mut state = self.lock();
        require_container(&state, container)?;
        Ok(state
            .blobs
            .remove(&(container.to_string(), key.to_string()))
            .is_some())
    }
}
