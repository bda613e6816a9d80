//! Publish pipeline entrypoint used by the CLI.

use std::time::Instant;

use webpub_core::{JobConfig, Operation};
use webpub_store::{BlobStore, StorageConnection};

use crate::diff::reconcile;
use crate::error::SyncError;
use crate::executor::{Executor, OperationOutcome, TransferLimits};
use crate::index_store::{self, RemoteIndex};
use crate::indexer::{ensure_unique_keys, index_local_tree};
use crate::observer::ProgressObserver;
use crate::report::{build_index, RunSummary, Statistics};

/// Knobs that are not part of the job file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOptions {
    /// Classify and report, but transfer nothing and leave the index alone.
    pub dry_run: bool,
    pub limits: TransferLimits,
}

/// Everything a run did.
#[derive(Debug, Clone)]
pub struct PublishReport {
    /// Classified operations, local files first, deletes last.
    pub operations: Vec<Operation>,
    pub statistics: Statistics,
    /// One outcome per operation; empty for a dry run.
    pub outcomes: Vec<OperationOutcome>,
    /// The index written back to the store; `None` for a dry run.
    pub new_index: Option<RemoteIndex>,
    pub index_outcome: Option<OperationOutcome>,
    pub summary: RunSummary,
    pub dry_run: bool,
}

impl PublishReport {
    pub fn is_success(&self) -> bool {
        self.summary.is_success()
    }
}

/// Connect to the store named by the job's connection string and publish.
pub fn run(
    config: &JobConfig,
    options: &PublishOptions,
    observer: &mut dyn ProgressObserver,
) -> Result<PublishReport, SyncError> {
    let mut connection = StorageConnection::parse(&config.storage_connection)?;
    if let Some(base) = &config.base_dir {
        connection = connection.relative_to(base);
    }
    tracing::info!(
        "publishing {} to {}",
        config.folder_name.display(),
        connection.describe()
    );
    let store = connection.open();
    run_with_store(store.as_ref(), config, options, observer)
}

/// Publish `config.folder_name` to an already opened store.
///
/// Setup problems (missing web container, unreadable files, key collisions,
/// a corrupt index) abort with `Err`. Transfer failures are tallied in the
/// returned report instead.
pub fn run_with_store(
    store: &dyn BlobStore,
    config: &JobConfig,
    options: &PublishOptions,
    observer: &mut dyn ProgressObserver,
) -> Result<PublishReport, SyncError> {
    let started = Instant::now();
    config.validate()?;
    let executor = Executor::new(store, config, options.limits)?;

    if !store.container_exists(&config.web_container)? {
        return Err(SyncError::ContainerNotFound(config.web_container.clone()));
    }
    if !options.dry_run {
        store.create_container_if_missing(&config.system_container)?;
    }

    let remote = index_store::load(store, &config.system_container, &config.index_name)?;
    let mut operations = index_local_tree(config)?;
    ensure_unique_keys(&operations)?;
    reconcile(&mut operations, &remote)?;

    let statistics = Statistics::from_operations(&operations);
    observer.on_plan(&statistics);

    if options.dry_run {
        tracing::info!(
            "dry run: {} operation(s) planned, nothing transferred",
            statistics.pending()
        );
        return Ok(PublishReport {
            operations,
            statistics,
            outcomes: Vec::new(),
            new_index: None,
            index_outcome: None,
            summary: RunSummary::tally(std::iter::empty(), started.elapsed()),
            dry_run: true,
        });
    }

    let outcomes = executor.execute_all(&operations, observer);
    let new_index = build_index(&operations, &outcomes);
    let (index_op, index_outcome) = index_store::save(
        &executor,
        &config.system_container,
        &config.index_name,
        &new_index,
        observer,
    )?;

    let summary = RunSummary::tally(
        operations
            .iter()
            .zip(&outcomes)
            .chain(std::iter::once((&index_op, &index_outcome))),
        started.elapsed(),
    );
    tracing::info!("{summary}");

    Ok(PublishReport {
        operations,
        statistics,
        outcomes,
        new_index: Some(new_index),
        index_outcome: Some(index_outcome),
        summary,
        dry_run: false,
    })
}
