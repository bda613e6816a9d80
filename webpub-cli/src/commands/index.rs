//! `webpub index` — inspect the remote index.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use webpub_core::JobConfig;
use webpub_store::StorageConnection;
use webpub_sync::index_store;

/// Arguments for `webpub index`.
#[derive(Args, Debug)]
pub struct IndexArgs {
    /// Path to the job configuration file.
    pub job: PathBuf,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct IndexJson<'a> {
    container: &'a str,
    name: &'a str,
    entries: &'a index_store::RemoteIndex,
}

#[derive(Tabled)]
struct IndexRow {
    #[tabled(rename = "storage key")]
    key: String,
    #[tabled(rename = "sha-256")]
    hash: String,
}

impl IndexArgs {
    pub fn run(self) -> Result<ExitCode> {
        let config = JobConfig::load(&self.job)
            .with_context(|| format!("failed to load job file {}", self.job.display()))?;
        let mut connection = StorageConnection::parse(&config.storage_connection)
            .context("invalid storage connection")?;
        if let Some(base) = &config.base_dir {
            connection = connection.relative_to(base);
        }
        let store = connection.open();
        let index = index_store::load(store.as_ref(), &config.system_container, &config.index_name)
            .with_context(|| format!("failed to read index from {}", connection.describe()))?;

        if self.json {
            let payload = IndexJson {
                container: &config.system_container,
                name: &config.index_name,
                entries: &index,
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize index JSON")?
            );
            return Ok(ExitCode::SUCCESS);
        }

        println!(
            "{}/{} | {} entries",
            config.system_container,
            config.index_name,
            index.len()
        );
        if index.is_empty() {
            println!("No index recorded yet. Run 'webpub publish' first.");
            return Ok(ExitCode::SUCCESS);
        }
        let rows: Vec<IndexRow> = index
            .iter()
            .map(|(key, hash)| IndexRow {
                key: key.clone(),
                hash: hash.clone(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(ExitCode::SUCCESS)
    }
}
