//! webpub — publish a static site folder to blob storage.
//!
//! # Usage
//!
//! ```text
//! webpub publish <job.json> [--dry-run]
//! webpub index <job.json> [--json]
//! webpub <job.json> [--dry-run]
//! ```
//!
//! A bare job path runs `publish`.
//! `-v` raises log output to info, `-vv` to debug. `RUST_LOG` overrides both.

mod commands;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Result};
use clap::{ArgAction, Parser, Subcommand};

use commands::{index::IndexArgs, publish::PublishArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "webpub",
    version,
    about = "Publish a local folder to blob storage, transferring only what changed",
    long_about = None,
)]
struct Cli {
    /// Increase log verbosity (repeatable).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Job file to publish when no subcommand is given.
    job: Option<PathBuf>,

    /// With a bare job path: print the plan without transferring anything.
    #[arg(long, requires = "job")]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload new and changed files, delete removed ones, and save the index.
    Publish(PublishArgs),

    /// Show the remote index recorded by the last publish.
    Index(IndexArgs),
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match (cli.command, cli.job) {
        (Some(_), Some(job)) => bail!(
            "unexpected job path {} before the subcommand",
            job.display()
        ),
        (Some(Commands::Publish(args)), None) => args.run(),
        (Some(Commands::Index(args)), None) => args.run(),
        (None, Some(job)) => PublishArgs {
            job,
            dry_run: cli.dry_run,
        }
        .run(),
        (None, None) => bail!("no job file given; run `webpub <job.json>` or see --help"),
    }
}
