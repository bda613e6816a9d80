//! `webpub publish` — sync a local folder to the web container.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;

use webpub_core::JobConfig;
use webpub_sync::PublishOptions;

use crate::output::{print_report, ConsoleObserver};

/// Arguments for `webpub publish`.
#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Path to the job configuration file.
    pub job: PathBuf,

    /// Classify changes and print the plan without transferring anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl PublishArgs {
    pub fn run(self) -> Result<ExitCode> {
        let config = JobConfig::load(&self.job)
            .with_context(|| format!("failed to load job file {}", self.job.display()))?;
        tracing::debug!("loaded job {}", self.job.display());
        let options = PublishOptions {
            dry_run: self.dry_run,
            ..PublishOptions::default()
        };

        let mut console = ConsoleObserver::new(self.dry_run);
        let report = webpub_sync::run(&config, &options, &mut console).with_context(|| {
            format!("publish of {} failed", config.folder_name.display())
        })?;
        print_report(&report);

        Ok(if report.is_success() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        })
    }
}
