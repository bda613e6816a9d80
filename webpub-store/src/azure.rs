//! Azure Blob Storage over its REST API.
//!
//! Requests are authorised either with a Shared Key signature (account name
//! and key from the connection string) or with a SAS token appended to every
//! URL. Only the handful of calls the publisher needs are implemented:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | container exists | `GET ?restype=container` |
//! | create container | `PUT ?restype=container` (409 is success) |
//! | get blob | `GET` (404 → `None`) |
//! | put blob | `PUT` with `x-ms-blob-type: BlockBlob` |
//! | put block | `PUT ?comp=block&blockid=…` |
//! | put block list | `PUT ?comp=blocklist` with an XML body |
//! | delete blob | `DELETE` (404 → `false`) |

use std::fmt;
use std::io::Read;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use url::Url;

use crate::blob::{BlobProperties, BlobStore, BlockId};
use crate::error::StoreError;

type HmacSha256 = Hmac<Sha256>;

/// REST API version sent with every request.
const API_VERSION: &str = "2021-08-06";

/// Longest error body echoed back in [`StoreError::Http`].
const MAX_ERROR_BODY: usize = 512;

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// How requests are authorised.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Decoded account key used for Shared Key signatures.
    SharedKey(Vec<u8>),
    /// SAS token query string, without the leading `?`.
    Sas(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::SharedKey(_) => f.write_str("SharedKey(<redacted>)"),
            Credentials::Sas(_) => f.write_str("Sas(<redacted>)"),
        }
    }
}

/// A storage account's blob endpoint plus credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureAccount {
    pub name: String,
    /// Blob service endpoint, e.g. `https://mysite.blob.core.windows.net/`.
    pub endpoint: Url,
    pub credentials: Credentials,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Blocking Azure Blob Storage client.
pub struct AzureBlobStore {
    account: AzureAccount,
    agent: ureq::Agent,
}

impl fmt::Debug for AzureBlobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureBlobStore")
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

/// One prepared REST call.
struct Call<'a> {
    method: &'static str,
    container: &'a str,
    key: Option<&'a str>,
    query: Vec<(&'static str, String)>,
    headers: Vec<(String, String)>,
    body: &'a [u8],
}

impl<'a> Call<'a> {
    fn new(method: &'static str, container: &'a str, key: Option<&'a str>) -> Self {
        Self {
            method,
            container,
            key,
            query: Vec::new(),
            headers: Vec::new(),
            body: &[],
        }
    }

    fn query(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.query.push((name, value.into()));
        self
    }

    fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    fn body(mut self, body: &'a [u8]) -> Self {
        self.body = body;
        self
    }

    fn resource(&self) -> String {
        match self.key {
            Some(key) => format!("{}/{}", self.container, key),
            None => self.container.to_string(),
        }
    }
}

impl AzureBlobStore {
    pub fn new(account: AzureAccount) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(30))
            .timeout_read(Duration::from_secs(300))
            .build();
        Self { account, agent }
    }

    /// Absolute URL of a container or object, without query string.
    fn resource_url(&self, container: &str, key: Option<&str>) -> Url {
        let mut url = self.account.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(container);
            if let Some(key) = key {
                segments.extend(key.split('/').filter(|s| !s.is_empty()));
            }
        }
        url
    }

    fn send(&self, call: Call<'_>) -> Result<ureq::Response, StoreError> {
        let mut url = self.resource_url(call.container, call.key);
        if !call.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &call.query {
                pairs.append_pair(name, value);
            }
        }
        if let Credentials::Sas(token) = &self.account.credentials {
            let query = match url.query() {
                Some(existing) => format!("{existing}&{token}"),
                None => token.clone(),
            };
            url.set_query(Some(&query));
        }

        let mut headers = call.headers.clone();
        headers.push((
            "x-ms-date".to_string(),
            Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        ));
        headers.push(("x-ms-version".to_string(), API_VERSION.to_string()));

        let mut request = self.agent.request(call.method, url.as_str());
        for (name, value) in &headers {
            request = request.set(name, value);
        }
        if let Credentials::SharedKey(key) = &self.account.credentials {
            let string_to_sign = string_to_sign(
                call.method,
                call.body.len(),
                &headers,
                &self.account.name,
                url.path(),
                &call.query,
            );
            let signature = sign(key, &string_to_sign)?;
            request = request.set(
                "Authorization",
                &format!("SharedKey {}:{}", self.account.name, signature),
            );
        }

        let result = if call.method == "PUT" {
            request.send_bytes(call.body)
        } else {
            request.call()
        };

        match result {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(status, response)) => {
                let mut message = response.into_string().unwrap_or_default();
                message.truncate(MAX_ERROR_BODY);
                Err(StoreError::Http {
                    method: call.method,
                    resource: call.resource(),
                    status,
                    message,
                })
            }
            Err(ureq::Error::Transport(transport)) => Err(StoreError::Transport {
                resource: call.resource(),
                message: transport.to_string(),
            }),
        }
    }
}

/// Headers that carry blob properties on Put Blob and Put Block List.
fn property_headers<'a>(mut call: Call<'a>, properties: &BlobProperties) -> Call<'a> {
    call = call.header("x-ms-blob-content-type", properties.content_type.clone());
    if let Some(directive) = &properties.cache_control {
        call = call.header("x-ms-blob-cache-control", directive.clone());
    }
    for (name, value) in &properties.metadata {
        call = call.header(&format!("x-ms-meta-{name}"), value.clone());
    }
    call
}

/// XML body of a Put Block List request.
fn block_list_xml(block_ids: &[BlockId]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?><BlockList>");
    for id in block_ids {
        xml.push_str("<Latest>");
        xml.push_str(id.as_str());
        xml.push_str("</Latest>");
    }
    xml.push_str("</BlockList>");
    xml
}

// ---------------------------------------------------------------------------
// Shared Key signing
// ---------------------------------------------------------------------------

/// Build the Shared Key string-to-sign for a blob service request.
///
/// Standard headers the client never sends are left empty; `Content-Length`
/// is empty for zero-length bodies.
fn string_to_sign(
    method: &str,
    content_length: usize,
    headers: &[(String, String)],
    account: &str,
    encoded_path: &str,
    query: &[(&str, String)],
) -> String {
    let content_length = if content_length == 0 {
        String::new()
    } else {
        content_length.to_string()
    };

    let mut ms_headers: Vec<(&str, &str)> = headers
        .iter()
        .filter(|(name, _)| name.starts_with("x-ms-"))
        .map(|(name, value)| (name.as_str(), value.trim()))
        .collect();
    ms_headers.sort();

    let mut canonical = format!(
        "{method}\n\n\n{content_length}\n\n\n\n\n\n\n\n\n"
    );
    for (name, value) in ms_headers {
        canonical.push_str(name);
        canonical.push(':');
        canonical.push_str(value);
        canonical.push('\n');
    }

    canonical.push('/');
    canonical.push_str(account);
    canonical.push_str(encoded_path);

    let mut params: Vec<(String, &str)> = query
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.as_str()))
        .collect();
    params.sort();
    for (name, value) in params {
        canonical.push('\n');
        canonical.push_str(&name);
        canonical.push(':');
        canonical.push_str(value);
    }
    canonical
}

/// Base64 HMAC-SHA256 of `string_to_sign` under the account key.
fn sign(key: &[u8], string_to_sign: &str) -> Result<String, StoreError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| StoreError::ConnectionString(format!("unusable account key: {e}")))?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

// ---------------------------------------------------------------------------
// BlobStore
// ---------------------------------------------------------------------------

impl BlobStore for AzureBlobStore {
    fn container_exists(&self, container: &str) -> Result<bool, StoreError> {
        match self.send(Call::new("GET", container, None).query("restype", "container")) {
            Ok(_) => Ok(true),
            Err(err) if err.status() == Some(404) => Ok(false),
            Err(err) => Err(err),
        }
    }

    fn create_container_if_missing(&self, container: &str) -> Result<(), StoreError> {
        match self.send(Call::new("PUT", container, None).query("restype", "container")) {
            Ok(_) => {
                tracing::info!("created container {container}");
                Ok(())
            }
            Err(err) if err.status() == Some(409) => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn get_blob(&self, container: &str, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let response = match self.send(Call::new("GET", container, Some(key))) {
            Ok(response) => response,
            Err(err) if err.status() == Some(404) => return Ok(None),
            Err(err) => return Err(err),
        };
        let mut data = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut data)
            .map_err(|e| StoreError::Transport {
                resource: format!("{container}/{key}"),
                message: e.to_string(),
            })?;
        Ok(Some(data))
    }

    fn put_blob(
        &self,
        container: &str,
        key: &str,
        data: &[u8],
        properties: &BlobProperties,
    ) -> Result<(), StoreError> {
        let call = Call::new("PUT", container, Some(key))
            .header("x-ms-blob-type", "BlockBlob")
            .body(data);
        self.send(property_headers(call, properties))?;
        Ok(())
    }

    fn put_block(
        &self,
        container: &str,
        key: &str,
        block_id: &BlockId,
        data: &[u8],
    ) -> Result<(), StoreError> {
        let call = Call::new("PUT", container, Some(key))
            .query("comp", "block")
            .query("blockid", block_id.as_str())
            .body(data);
        self.send(call)?;
        Ok(())
    }

    fn put_block_list(
        &self,
        container: &str,
        key: &str,
        block_ids: &[BlockId],
        properties: &BlobProperties,
    ) -> Result<(), StoreError> {
        let xml = block_list_xml(block_ids);
        let call = Call::new("PUT", container, Some(key))
            .query("comp", "blocklist")
            .body(xml.as_bytes());
        self.send(property_headers(call, properties))?;
        Ok(())
    }

    fn delete_blob(&self, container: &str, key: &str) -> Result<bool, StoreError> {
        match self.send(Call::new("DELETE", container, Some(key))) {
            Ok(_) => Ok(true),
            Err(err) if err.status() == Some(404) => Ok(false),
            Err(err) => Err(err),
        }
    }
}
