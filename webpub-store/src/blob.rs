//! The [`BlobStore`] seam and the values passed through it.

use std::collections::BTreeMap;
use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Properties stored alongside an object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobProperties {
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl BlobProperties {
    pub fn new(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            ..Self::default()
        }
    }

    pub fn with_cache_control(mut self, directive: impl Into<String>) -> Self {
        self.cache_control = Some(directive.into());
        self
    }

    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(name.into(), value.into());
        self
    }
}

/// Identifier of one staged block of a chunked upload.
///
/// Encodes the block's sequential index as base64 of its 4-byte
/// little-endian representation, so every id of a blob has the same length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(String);

impl BlockId {
    pub fn from_index(index: u32) -> Self {
        Self(STANDARD.encode(index.to_le_bytes()))
    }

    /// The block index this id was built from, if it is well formed.
    pub fn index(&self) -> Option<u32> {
        let bytes = STANDARD.decode(&self.0).ok()?;
        let bytes: [u8; 4] = bytes.try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A remote object store organised as containers of named objects.
///
/// Calls block until the remote side has answered. Object keys use `/` as
/// the separator and never start with one.
pub trait BlobStore {
    /// Whether `container` exists.
    fn container_exists(&self, container: &str) -> Result<bool, StoreError>;

    /// Create `container` unless it already exists.
    fn create_container_if_missing(&self, container: &str) -> Result<(), StoreError>;

    /// Download an object; `Ok(None)` when it does not exist.
    fn get_blob(&self, container: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Upload an object in a single request, replacing any previous version.
    fn put_blob(
        &self,
        container: &str,
        key: &str,
        data: &[u8],
        properties: &BlobProperties,
    ) -> Result<(), StoreError>;

    /// Stage one block of a chunked upload.
    fn put_block(
        &self,
        container: &str,
        key: &str,
        block_id: &BlockId,
        data: &[u8],
    ) -> Result<(), StoreError>;

    /// Commit staged blocks, in the given order, as the object's content.
    fn put_block_list(
        &self,
        container: &str,
        key: &str,
        block_ids: &[BlockId],
        properties: &BlobProperties,
    ) -> Result<(), StoreError>;

    /// Delete an object. Returns whether it existed.
    fn delete_blob(&self, container: &str, key: &str) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_ids_have_fixed_width() {
        let lengths: Vec<usize> = [0u32, 1, 255, 65_536, u32::MAX]
            .into_iter()
            .map(|i| BlockId::from_index(i).as_str().len())
            .collect();
        assert!(lengths.iter().all(|l| *l == lengths[0]), "{lengths:?}");
    }

    #[test]
    fn block_id_encodes_little_endian_index() {
        assert_eq!(BlockId::from_index(0).as_str(), "AAAAAA==");
        assert_eq!(BlockId::from_index(1).as_str(), "AQAAAA==");
        assert_eq!(BlockId::from_index(7).index(), Some(7));
    }

    #[test]
    fn properties_builder_collects_metadata() {
        let props = BlobProperties::new("text/html")
            .with_cache_control("no-cache")
            .with_metadata("content_sha256", "abc");
        assert_eq!(props.cache_control.as_deref(), Some("no-cache"));
        assert_eq!(props.metadata["content_sha256"], "abc");
    }
}
