//! Storage connection strings.
//!
//! A connection string is a `;`-separated list of `Key=Value` pairs. Keys are
//! case-insensitive; values keep everything after the first `=`.
//!
//! ```text
//! UseDevelopmentStorage=true
//! DefaultEndpointsProtocol=https;AccountName=mysite;AccountKey=<base64>;EndpointSuffix=core.windows.net
//! BlobEndpoint=https://mysite.blob.core.windows.net/;SharedAccessSignature=sv=...&sig=...
//! LocalFolder=/srv/staging
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use url::Url;

use crate::azure::{AzureAccount, AzureBlobStore, Credentials};
use crate::blob::BlobStore;
use crate::error::StoreError;
use crate::local::LocalFolderStore;

const DEV_ACCOUNT_NAME: &str = "devstoreaccount1";
const DEV_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const DEV_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

/// A parsed connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConnection {
    Azure(AzureAccount),
    LocalFolder(PathBuf),
}

impl StorageConnection {
    pub fn parse(connection: &str) -> Result<Self, StoreError> {
        let pairs = parse_pairs(connection)?;
        let get = |key: &str| pairs.get(key).map(String::as_str);

        if let Some(folder) = get("localfolder") {
            if folder.is_empty() {
                return Err(invalid("LocalFolder must not be empty"));
            }
            return Ok(Self::LocalFolder(PathBuf::from(folder)));
        }

        if get("usedevelopmentstorage").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
            return Ok(Self::Azure(AzureAccount {
                name: DEV_ACCOUNT_NAME.to_string(),
                endpoint: parse_endpoint(DEV_BLOB_ENDPOINT)?,
                credentials: Credentials::SharedKey(decode_key(DEV_ACCOUNT_KEY)?),
            }));
        }

        if let Some(sas) = get("sharedaccesssignature") {
            let endpoint = get("blobendpoint")
                .ok_or_else(|| invalid("SharedAccessSignature requires BlobEndpoint"))?;
            let endpoint = parse_endpoint(endpoint)?;
            let name = get("accountname")
                .map(str::to_string)
                .or_else(|| account_from_host(&endpoint))
                .unwrap_or_default();
            return Ok(Self::Azure(AzureAccount {
                name,
                endpoint,
                credentials: Credentials::Sas(sas.trim_start_matches('?').to_string()),
            }));
        }

        let name = get("accountname").ok_or_else(|| invalid("AccountName is missing"))?;
        let key = get("accountkey").ok_or_else(|| invalid("AccountKey is missing"))?;
        let endpoint = match get("blobendpoint") {
            Some(endpoint) => parse_endpoint(endpoint)?,
            None => {
                let protocol = get("defaultendpointsprotocol").unwrap_or("https");
                let suffix = get("endpointsuffix").unwrap_or("core.windows.net");
                parse_endpoint(&format!("{protocol}://{name}.blob.{suffix}/"))?
            }
        };
        Ok(Self::Azure(AzureAccount {
            name: name.to_string(),
            endpoint,
            credentials: Credentials::SharedKey(decode_key(key)?),
        }))
    }

    /// Resolve a relative `LocalFolder` against `base`.
    pub fn relative_to(self, base: &Path) -> Self {
        match self {
            Self::LocalFolder(path) if path.is_relative() => Self::LocalFolder(base.join(path)),
            other => other,
        }
    }

    /// Human-readable target, safe to print (no secrets).
    pub fn describe(&self) -> String {
        match self {
            Self::Azure(account) => account.endpoint.to_string(),
            Self::LocalFolder(path) => path.display().to_string(),
        }
    }

    /// Open a store for this connection.
    pub fn open(&self) -> Box<dyn BlobStore> {
        match self {
            Self::Azure(account) => Box::new(AzureBlobStore::new(account.clone())),
            Self::LocalFolder(path) => Box::new(LocalFolderStore::new(path.clone())),
        }
    }
}

fn invalid(message: &str) -> StoreError {
    StoreError::ConnectionString(message.to_string())
}

fn parse_pairs(connection: &str) -> Result<HashMap<String, String>, StoreError> {
    let mut pairs = HashMap::new();
    for part in connection.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((key, value)) = part.split_once('=') else {
            return Err(StoreError::ConnectionString(format!(
                "expected Key=Value, found '{part}'"
            )));
        };
        pairs.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
    }
    if pairs.is_empty() {
        return Err(invalid("connection string is empty"));
    }
    Ok(pairs)
}

fn parse_endpoint(endpoint: &str) -> Result<Url, StoreError> {
    Url::parse(endpoint)
        .map_err(|e| StoreError::ConnectionString(format!("bad endpoint '{endpoint}': {e}")))
}

fn decode_key(key: &str) -> Result<Vec<u8>, StoreError> {
    STANDARD
        .decode(key)
        .map_err(|e| StoreError::ConnectionString(format!("AccountKey is not base64: {e}")))
}

fn account_from_host(endpoint: &Url) -> Option<String> {
    endpoint
        .host_str()
        .and_then(|host| host.split('.').next())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn account_key_connection_builds_default_endpoint() {
        let conn = StorageConnection::parse(
            "DefaultEndpointsProtocol=https;AccountName=mysite;AccountKey=c2VjcmV0;EndpointSuffix=core.windows.net",
        )
        .unwrap();
        let StorageConnection::Azure(account) = conn else {
            panic!("expected azure account");
        };
        assert_eq!(account.name, "mysite");
        assert_eq!(account.endpoint.as_str(), "https://mysite.blob.core.windows.net/");
        assert_eq!(account.credentials, Credentials::SharedKey(b"secret".to_vec()));
    }

    #[test]
    fn keys_are_case_insensitive_and_values_keep_equals_signs() {
        let conn =
            StorageConnection::parse("accountname=mysite;ACCOUNTKEY=c2VjcmV0IQ==").unwrap();
        let StorageConnection::Azure(account) = conn else {
            panic!("expected azure account");
        };
        assert_eq!(account.credentials, Credentials::SharedKey(b"secret!".to_vec()));
    }

    #[test]
    fn sas_connection_keeps_token_and_derives_account() {
        let conn = StorageConnection::parse(
            "BlobEndpoint=https://mysite.blob.core.windows.net/;SharedAccessSignature=?sv=2021-08-06&sig=abc%3D",
        )
        .unwrap();
        let StorageConnection::Azure(account) = conn else {
            panic!("expected azure account");
        };
        assert_eq!(account.name, "mysite");
        assert_eq!(
            account.credentials,
            Credentials::Sas("sv=2021-08-06&sig=abc%3D".to_string())
        );
    }

    #[test]
    fn development_storage_points_at_emulator() {
        let conn = StorageConnection::parse("UseDevelopmentStorage=true").unwrap();
        assert_eq!(conn.describe(), "http://127.0.0.1:10000/devstoreaccount1");
    }

    #[test]
    fn local_folder_resolves_relative_paths() {
        let conn = StorageConnection::parse("LocalFolder=staging")
            .unwrap()
            .relative_to(Path::new("/jobs"));
        assert_eq!(conn, StorageConnection::LocalFolder(PathBuf::from("/jobs/staging")));
    }

    #[rstest]
    #[case("")]
    #[case("garbage")]
    #[case("AccountName=mysite")]
    #[case("AccountName=mysite;AccountKey=not base64!")]
    #[case("SharedAccessSignature=sv=1")]
    #[case("LocalFolder=")]
    fn malformed_connection_strings_are_rejected(#[case] input: &str) {
        let err = StorageConnection::parse(input).unwrap_err();
        assert!(matches!(err, StoreError::ConnectionString(_)), "got: {err}");
    }
}
