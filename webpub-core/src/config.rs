//! Publish job configuration.
//!
//! A job is a single JSON file naming the local folder to publish, the remote
//! store to publish into, and the tables used to decorate uploaded objects:
//!
//! ```json
//! {
//!   "storageConnection": "AccountName=mysite;AccountKey=...",
//!   "folderName": "output",
//!   "convertToLowercase": false,
//!   "indexFileName": "index.html",
//!   "removeExtensions": [".html"],
//!   "contentTypeMap": { ".html": "text/html", ".css": "text/css" },
//!   "cacheControlRules": { "^assets/": "public, max-age=31536000" },
//!   "retryCount": 3,
//!   "retryWaitMilliseconds": 500
//! }
//! ```
//!
//! Object-valued tables keep their document order: the first matching entry
//! wins in both [`ContentTypeMap::resolve`] and [`CacheControlRules::resolve`].
//! Unknown keys are rejected to catch typos early.

use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;

/// Content type used when no `contentTypeMap` entry matches.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Cache-control directive used when no `cacheControlRules` entry matches.
pub const DEFAULT_CACHE_CONTROL: &str = "no-cache, no-store, must-revalidate";

// ---------------------------------------------------------------------------
// Ordered key/value table
// ---------------------------------------------------------------------------

/// A JSON object read as an ordered list of string pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderedTable(pub Vec<(String, String)>);

impl OrderedTable {
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OrderedTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl Serialize for OrderedTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OrderedTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = OrderedTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((k, v)) = access.next_entry::<String, String>()? {
                    entries.push((k, v));
                }
                Ok(OrderedTable(entries))
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

// ---------------------------------------------------------------------------
// JobConfig
// ---------------------------------------------------------------------------

/// A publish job loaded from a JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JobConfig {
    /// Connection string for the remote store.
    #[serde(alias = "storageConnectionString", alias = "StorageConnectionString")]
    pub storage_connection: String,
    /// Local folder to publish.
    #[serde(alias = "FolderName")]
    pub folder_name: PathBuf,
    /// Lowercase every storage key.
    #[serde(default, alias = "ConvertToLowercase")]
    pub convert_to_lowercase: bool,
    /// Default-document filename, exempt from extension stripping.
    #[serde(default = "default_index_file_name", alias = "IndexFileName")]
    pub index_file_name: String,
    /// Extensions dropped from storage keys (leading dot optional).
    #[serde(default, alias = "RemoveExtensions")]
    pub remove_extensions: Vec<String>,
    /// Extension → MIME type.
    #[serde(default, alias = "ContentTypeMap")]
    pub content_type_map: OrderedTable,
    /// Logical-name regex → cache-control directive.
    #[serde(default, alias = "CacheControlRules")]
    pub cache_control_rules: OrderedTable,
    #[serde(default = "default_retry_count", alias = "RetryCount")]
    pub retry_count: u32,
    #[serde(default = "default_retry_wait", alias = "RetryWaitMilliseconds")]
    pub retry_wait_milliseconds: u64,
    /// Public container receiving site content.
    #[serde(default = "default_web_container")]
    pub web_container: String,
    /// Private container holding the remote index.
    #[serde(default = "default_system_container")]
    pub system_container: String,
    /// Name of the remote index object inside the system container.
    #[serde(default = "default_index_name")]
    pub index_name: String,
    /// Directory of the job file, when loaded from one.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

fn default_index_file_name() -> String {
    "index.html".to_string()
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_wait() -> u64 {
    500
}

fn default_web_container() -> String {
    "$web".to_string()
}

fn default_system_container() -> String {
    "xml4web".to_string()
}

fn default_index_name() -> String {
    "storage-index.json".to_string()
}

impl JobConfig {
    /// A job with every optional field at its default.
    pub fn new(storage_connection: impl Into<String>, folder_name: impl Into<PathBuf>) -> Self {
        Self {
            storage_connection: storage_connection.into(),
            folder_name: folder_name.into(),
            convert_to_lowercase: false,
            index_file_name: default_index_file_name(),
            remove_extensions: Vec::new(),
            content_type_map: OrderedTable::default(),
            cache_control_rules: OrderedTable::default(),
            retry_count: default_retry_count(),
            retry_wait_milliseconds: default_retry_wait(),
            web_container: default_web_container(),
            system_container: default_system_container(),
            index_name: default_index_name(),
            base_dir: None,
        }
    }

    /// Load and validate a job file.
    ///
    /// A relative `folderName` is resolved against the directory containing
    /// the job file, so jobs can be run from anywhere.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: JobConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        if let Some(dir) = &config.base_dir {
            if config.folder_name.is_relative() {
                config.folder_name = dir.join(&config.folder_name);
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate config values are usable before any remote call is made.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_connection.trim().is_empty() {
            return Err(ConfigError::Validation(
                "storageConnection must not be empty".into(),
            ));
        }
        if self.folder_name.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "folderName must not be empty".into(),
            ));
        }
        if self.web_container.is_empty() || self.system_container.is_empty() {
            return Err(ConfigError::Validation(
                "container names must not be empty".into(),
            ));
        }
        if self.index_name.is_empty() {
            return Err(ConfigError::Validation(
                "indexName must not be empty".into(),
            ));
        }
        CacheControlRules::compile(&self.cache_control_rules)?;
        Ok(())
    }

    /// Whether `file_name` is the configured default document.
    pub fn is_index_file(&self, file_name: &str) -> bool {
        file_name.eq_ignore_ascii_case(&self.index_file_name)
    }

    /// Whether `extension` (with or without a leading dot) is stripped from
    /// storage keys.
    pub fn strips_extension(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.');
        self.remove_extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(extension))
    }
}

// ---------------------------------------------------------------------------
// Lookup tables
// ---------------------------------------------------------------------------

/// Extension → MIME type lookup.
#[derive(Debug, Clone, Default)]
pub struct ContentTypeMap {
    entries: Vec<(String, String)>,
}

impl ContentTypeMap {
    pub fn new(table: &OrderedTable) -> Self {
        Self {
            entries: table
                .iter()
                .map(|(ext, mime)| (ext.trim_start_matches('.').to_string(), mime.to_string()))
                .collect(),
        }
    }

    /// Content type for a file name or path, by its extension.
    ///
    /// Falls back to [`DEFAULT_CONTENT_TYPE`] when the name has no extension
    /// or no entry matches.
    pub fn resolve(&self, name: &str) -> &str {
        let Some(extension) = Path::new(name).extension().and_then(|e| e.to_str()) else {
            return DEFAULT_CONTENT_TYPE;
        };
        self.entries
            .iter()
            .find(|(ext, _)| ext.eq_ignore_ascii_case(extension))
            .map(|(_, mime)| mime.as_str())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}

/// Ordered logical-name pattern → cache-control directive rules.
#[derive(Debug, Clone, Default)]
pub struct CacheControlRules {
    rules: Vec<(Regex, String)>,
}

impl CacheControlRules {
    /// Compile every pattern, keeping table order.
    pub fn compile(table: &OrderedTable) -> Result<Self, ConfigError> {
        let rules = table
            .iter()
            .map(|(pattern, directive)| {
                Regex::new(pattern)
                    .map(|re| (re, directive.to_string()))
                    .map_err(|source| ConfigError::Pattern {
                        pattern: pattern.to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// Directive of the first rule whose pattern matches `logical_name`.
    pub fn resolve(&self, logical_name: &str) -> &str {
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(logical_name))
            .map(|(_, directive)| directive.as_str())
            .unwrap_or(DEFAULT_CACHE_CONTROL)
    }
}
