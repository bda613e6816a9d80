//! Transfer executor: carries out classified operations against a store.
//!
//! Each operation runs to completion, retries included, before the next one
//! starts. Transfer failures are returned as [`OperationOutcome::Failed`]
//! values; only setup problems surface as [`SyncError`].

use std::fs::File;
use std::io::Read;
use std::path::Path;

use webpub_core::{CacheControlRules, ContentTypeMap, JobConfig, Operation, OperationKind};
use webpub_store::{BlobProperties, BlobStore, BlockId};

use crate::error::{io_err, SyncError};
use crate::observer::ProgressObserver;
use crate::retry::{with_retry, RetryOutcome, RetryPolicy};

/// Metadata entry that carries the content hash on every uploaded object.
pub const HASH_METADATA_KEY: &str = "content_sha256";

const MIB: usize = 1024 * 1024;

/// Size thresholds for chunked transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferLimits {
    /// Largest payload sent as a single request.
    pub single_put_max: u64,
    /// Block size for anything larger.
    pub block_size: usize,
}

impl Default for TransferLimits {
    fn default() -> Self {
        Self {
            single_put_max: 32 * MIB as u64,
            block_size: 4 * MIB,
        }
    }
}

impl TransferLimits {
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.block_size == 0 {
            return Err(SyncError::Limits("block size must be positive".into()));
        }
        Ok(())
    }

    /// Number of blocks a payload of `size` bytes is split into.
    pub fn block_count(&self, size: u64) -> u64 {
        size.div_ceil(self.block_size as u64)
    }
}

/// Result of executing one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Succeeded { attempts: u32 },
    /// Nothing to do (`Ignore` or `Unclassified`).
    Skipped,
    Failed { attempts: u32, error: String },
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// Executes operations against the web container of a store.
pub struct Executor<'a> {
    store: &'a dyn BlobStore,
    container: String,
    content_types: ContentTypeMap,
    cache_control: CacheControlRules,
    retry: RetryPolicy,
    limits: TransferLimits,
}

impl<'a> Executor<'a> {
    pub fn new(
        store: &'a dyn BlobStore,
        config: &JobConfig,
        limits: TransferLimits,
    ) -> Result<Self, SyncError> {
        limits.validate()?;
        Ok(Self {
            store,
            container: config.web_container.clone(),
            content_types: ContentTypeMap::new(&config.content_type_map),
            cache_control: CacheControlRules::compile(&config.cache_control_rules)?,
            retry: RetryPolicy::from_config(config),
            limits,
        })
    }

    /// Execute every operation in order, reporting progress to `observer`.
    pub fn execute_all(
        &self,
        operations: &[Operation],
        observer: &mut dyn ProgressObserver,
    ) -> Vec<OperationOutcome> {
        let total = operations.len();
        operations
            .iter()
            .enumerate()
            .map(|(i, op)| {
                observer.on_operation_start(i + 1, total, op);
                let outcome = self.execute(op, observer);
                observer.on_operation_finished(op, &outcome);
                outcome
            })
            .collect()
    }

    /// Execute one operation with retry.
    pub fn execute(
        &self,
        operation: &Operation,
        observer: &mut dyn ProgressObserver,
    ) -> OperationOutcome {
        match operation.kind {
            OperationKind::Unclassified | OperationKind::Ignore => OperationOutcome::Skipped,
            OperationKind::Upload | OperationKind::Update => {
                self.run_with_retry(operation, observer, |obs| self.upload_file(operation, obs))
            }
            OperationKind::Delete => {
                self.run_with_retry(operation, observer, |_| self.delete(operation))
            }
        }
    }

    /// Upload an in-memory payload to `container` with retry.
    pub fn upload_bytes(
        &self,
        container: &str,
        operation: &Operation,
        data: &[u8],
        content_type: &str,
        observer: &mut dyn ProgressObserver,
    ) -> OperationOutcome {
        let mut properties = BlobProperties::new(content_type);
        if let Some(hash) = &operation.content_hash {
            properties = properties.with_metadata(HASH_METADATA_KEY, hash.as_str());
        }
        let origin = Path::new(&operation.logical_name);
        self.run_with_retry(operation, observer, |obs| {
            self.transfer(
                container,
                &operation.storage_key,
                origin,
                data,
                data.len() as u64,
                &properties,
                obs,
            )
        })
    }

    /// Properties an uploaded file is stored with.
    pub fn properties_for(&self, operation: &Operation) -> BlobProperties {
        let name = operation.logical_name.as_str();
        let mut properties = BlobProperties::new(self.content_types.resolve(name))
            .with_cache_control(self.cache_control.resolve(name));
        if let Some(hash) = &operation.content_hash {
            properties = properties.with_metadata(HASH_METADATA_KEY, hash.as_str());
        }
        properties
    }

    fn run_with_retry<F>(
        &self,
        operation: &Operation,
        observer: &mut dyn ProgressObserver,
        mut action: F,
    ) -> OperationOutcome
    where
        F: FnMut(&mut dyn ProgressObserver) -> Result<(), SyncError>,
    {
        let max_attempts = self.retry.max_attempts();
        let pause = self.retry.pause;
        let outcome = with_retry(
            self.retry,
            observer,
            |obs| action(obs),
            |obs, attempt, err: &SyncError, will_retry| {
                let message = err.to_string();
                if will_retry {
                    tracing::warn!(
                        "{} {}: attempt {attempt}/{max_attempts} failed: {message}; retrying in {} ms",
                        operation.kind,
                        operation.storage_key,
                        pause.as_millis()
                    );
                } else {
                    tracing::warn!(
                        "{} {}: giving up after {attempt} attempt(s): {message}",
                        operation.kind,
                        operation.storage_key
                    );
                }
                obs.on_attempt_failed(operation, attempt, &message, will_retry);
            },
        );
        match outcome {
            RetryOutcome::Succeeded { attempts } => OperationOutcome::Succeeded { attempts },
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => OperationOutcome::Failed {
                attempts,
                error: last_error.to_string(),
            },
        }
    }

    fn upload_file(
        &self,
        operation: &Operation,
        observer: &mut dyn ProgressObserver,
    ) -> Result<(), SyncError> {
        let Some(path) = operation.local_path.as_deref() else {
            return Err(io_err(
                &operation.logical_name,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no local file to upload"),
            ));
        };
        let file = File::open(path).map_err(|e| io_err(path, e))?;
        // The file may have changed since indexing; transfer what is there now.
        let size = file.metadata().map_err(|e| io_err(path, e))?.len();
        let properties = self.properties_for(operation);
        self.transfer(
            &self.container,
            &operation.storage_key,
            path,
            file,
            size,
            &properties,
            observer,
        )
    }

    fn delete(&self, operation: &Operation) -> Result<(), SyncError> {
        let existed = self
            .store
            .delete_blob(&self.container, &operation.storage_key)?;
        if !existed {
            tracing::debug!("{} was already absent", operation.storage_key);
        }
        Ok(())
    }

    /// Send `size` bytes from `reader` to `container/key`.
    ///
    /// Payloads up to `single_put_max` go in one request; larger ones are
    /// staged as numbered blocks and committed in index order.
    #[allow(clippy::too_many_arguments)]
    pub fn transfer<R: Read>(
        &self,
        container: &str,
        key: &str,
        origin: &Path,
        reader: R,
        size: u64,
        properties: &BlobProperties,
        observer: &mut dyn ProgressObserver,
    ) -> Result<(), SyncError> {
        let mut reader = reader.take(size);

        if size <= self.limits.single_put_max {
            let mut data = Vec::with_capacity(size as usize);
            reader
                .read_to_end(&mut data)
                .map_err(|e| io_err(origin, e))?;
            self.store.put_blob(container, key, &data, properties)?;
            return Ok(());
        }

        let count = self.limits.block_count(size);
        let count = u32::try_from(count).map_err(|_| {
            SyncError::Limits(format!("{key} would need {count} blocks; raise the block size"))
        })?;
        let block_size = self.limits.block_size as u64;
        let mut buffer = vec![0u8; self.limits.block_size];
        let mut block_ids = Vec::with_capacity(count as usize);

        for index in 0..count {
            let remaining = size - u64::from(index) * block_size;
            let len = remaining.min(block_size) as usize;
            reader
                .read_exact(&mut buffer[..len])
                .map_err(|e| io_err(origin, e))?;
            let id = BlockId::from_index(index);
            self.store.put_block(container, key, &id, &buffer[..len])?;
            block_ids.push(id);
            observer.on_block_progress(index + 1, count);
        }

        self.store
            .put_block_list(container, key, &block_ids, properties)?;
        tracing::debug!("committed {count} block(s) for {container}/{key}");
        Ok(())
    }
}
