//! Console rendering of a publish run.

use std::io::Write;

use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use webpub_core::{Operation, OperationKind};
use webpub_sync::{OperationOutcome, ProgressObserver, PublishReport, Statistics};

#[derive(Tabled)]
struct StatisticsRow {
    #[tabled(rename = "operation")]
    operation: String,
    #[tabled(rename = "items")]
    items: usize,
    #[tabled(rename = "size (MB)")]
    size: String,
}

/// Prints the plan and a running count of operations to stdout.
pub struct ConsoleObserver {
    prefix: &'static str,
    in_block_progress: bool,
}

impl ConsoleObserver {
    pub fn new(dry_run: bool) -> Self {
        Self {
            prefix: if dry_run { "[dry-run] " } else { "" },
            in_block_progress: false,
        }
    }

    fn end_block_progress(&mut self) {
        if self.in_block_progress {
            println!();
            self.in_block_progress = false;
        }
    }
}

impl ProgressObserver for ConsoleObserver {
    fn on_plan(&mut self, statistics: &Statistics) {
        print_statistics(self.prefix, statistics);
    }

    fn on_operation_start(&mut self, position: usize, total: usize, operation: &Operation) {
        if operation.kind == OperationKind::Ignore {
            return;
        }
        println!(
            "[{position}/{total}] {} {}",
            kind_label(operation.kind),
            operation.storage_key
        );
    }

    fn on_block_progress(&mut self, current: u32, total: u32) {
        print!("\r    block {current}/{total}");
        let _ = std::io::stdout().flush();
        self.in_block_progress = current < total;
        if !self.in_block_progress {
            println!();
        }
    }

    fn on_attempt_failed(&mut self, operation: &Operation, attempt: u32, error: &str, will_retry: bool) {
        self.end_block_progress();
        let next = if will_retry { ", retrying" } else { "" };
        eprintln!(
            "    {} attempt {attempt} for {} failed: {error}{next}",
            "!".yellow().bold(),
            operation.storage_key
        );
    }

    fn on_operation_finished(&mut self, operation: &Operation, outcome: &OperationOutcome) {
        self.end_block_progress();
        if let OperationOutcome::Failed { attempts, .. } = outcome {
            println!(
                "    {} {} gave up after {attempts} attempt(s)",
                "✗".red().bold(),
                operation.storage_key
            );
        }
    }
}

fn kind_label(kind: OperationKind) -> colored::ColoredString {
    let label = format!("{:<6}", kind.to_string());
    match kind {
        OperationKind::Upload => label.green(),
        OperationKind::Update => label.cyan(),
        OperationKind::Delete => label.red(),
        OperationKind::Ignore | OperationKind::Unclassified => label.bright_black(),
    }
}

fn print_statistics(prefix: &str, statistics: &Statistics) {
    let rows: Vec<StatisticsRow> = statistics
        .rows()
        .map(|(kind, tally)| StatisticsRow {
            operation: capitalize(&kind.to_string()),
            items: tally.count,
            size: format!("{:.2}", tally.megabytes()),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{prefix}{} operation(s) to perform", statistics.pending());
    println!("{table}");
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Final lines after a run: failures, then the summary.
pub fn print_report(report: &PublishReport) {
    if report.dry_run {
        println!(
            "[dry-run] {} operation(s) would run; nothing was transferred",
            report.statistics.pending()
        );
        return;
    }

    let summary = &report.summary;
    if !summary.failures.is_empty() {
        println!("{}", "Failed operations:".red().bold());
        for failure in &summary.failures {
            println!(
                "  {} {} ({} attempt(s)): {}",
                failure.kind, failure.storage_key, failure.attempts, failure.error
            );
        }
    }

    let line = summary.to_string();
    if summary.is_success() {
        println!("{} {}", "✓".green().bold(), line.green());
    } else {
        println!("{} {}", "✗".red().bold(), line.red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capitalizes_kind_names() {
        assert_eq!(capitalize("delete"), "Delete");
        assert_eq!(capitalize(""), "");
    }
}
