//! Run reporting: plan statistics, the rebuilt remote index, and the final
//! success/failure tally.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use webpub_core::{Operation, OperationKind};

use crate::executor::OperationOutcome;
use crate::index_store::RemoteIndex;

/// Count and byte total for one operation kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindTally {
    pub count: usize,
    pub bytes: u64,
}

impl KindTally {
    /// Size in megabytes (2^20 bytes).
    pub fn megabytes(&self) -> f64 {
        self.bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Per-kind tallies of a classified plan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statistics {
    tallies: HashMap<OperationKind, KindTally>,
}

impl Statistics {
    pub fn from_operations(operations: &[Operation]) -> Self {
        let mut tallies: HashMap<OperationKind, KindTally> = HashMap::new();
        for op in operations {
            let tally = tallies.entry(op.kind).or_default();
            tally.count += 1;
            tally.bytes += op.size;
        }
        Self { tallies }
    }

    pub fn get(&self, kind: OperationKind) -> KindTally {
        self.tallies.get(&kind).copied().unwrap_or_default()
    }

    /// Rows in display order: Delete, Update, Upload, Ignore.
    pub fn rows(&self) -> impl Iterator<Item = (OperationKind, KindTally)> + '_ {
        OperationKind::reported()
            .iter()
            .map(move |kind| (*kind, self.get(*kind)))
    }

    /// Operations that will touch the store.
    pub fn pending(&self) -> usize {
        self.tallies
            .iter()
            .filter(|(kind, _)| kind.is_transfer())
            .map(|(_, tally)| tally.count)
            .sum()
    }
}

/// Build the index that reflects the store after this run.
///
/// Only uploads, updates and ignores that succeeded contribute; deletes are
/// excluded by construction.
pub fn build_index(operations: &[Operation], outcomes: &[OperationOutcome]) -> RemoteIndex {
    operations
        .iter()
        .zip(outcomes)
        .filter(|(op, outcome)| {
            matches!(
                op.kind,
                OperationKind::Upload | OperationKind::Update | OperationKind::Ignore
            ) && outcome.is_success()
        })
        .filter_map(|(op, _)| {
            op.content_hash
                .as_ref()
                .map(|hash| (op.storage_key.clone(), hash.clone()))
        })
        .collect()
}

/// One operation that exhausted its retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedOperation {
    pub storage_key: String,
    pub kind: OperationKind,
    pub attempts: u32,
    pub error: String,
}

/// Final tally of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed: Duration,
    pub failures: Vec<FailedOperation>,
}

impl RunSummary {
    /// Tally operation results.
    ///
    /// An ignored file counts as a success; an unclassified one is not counted.
    pub fn tally<'a, I>(results: I, elapsed: Duration) -> Self
    where
        I: IntoIterator<Item = (&'a Operation, &'a OperationOutcome)>,
    {
        let mut summary = Self {
            succeeded: 0,
            failed: 0,
            elapsed,
            failures: Vec::new(),
        };
        for (op, outcome) in results {
            match outcome {
                OperationOutcome::Succeeded { .. } => summary.succeeded += 1,
                OperationOutcome::Skipped if op.kind == OperationKind::Ignore => {
                    summary.succeeded += 1
                }
                OperationOutcome::Skipped => {}
                OperationOutcome::Failed { attempts, error } => {
                    summary.failed += 1;
                    summary.failures.push(FailedOperation {
                        storage_key: op.storage_key.clone(),
                        kind: op.kind,
                        attempts: *attempts,
                        error: error.clone(),
                    });
                }
            }
        }
        summary
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elapsed = format_elapsed(self.elapsed);
        if self.failed == 0 {
            write!(
                f,
                "All {} operations completed successfully in {elapsed}",
                self.succeeded
            )
        } else {
            write!(
                f,
                "Successfully completed {} operations, {} failed in {elapsed}",
                self.succeeded, self.failed
            )
        }
    }
}

/// `1.25s` under a minute, `2m 05s` above.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    if secs < 60 {
        format!("{:.2}s", elapsed.as_secs_f64())
    } else {
        format!("{}m {:02}s", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(kind: OperationKind, key: &str, size: u64) -> Operation {
        let mut op = Operation::local(key, format!("/site/{key}"), key, size);
        op.kind = kind;
        op.content_hash = Some(format!("hash-{key}"));
        op
    }

    #[test]
    fn statistics_tally_counts_and_bytes_per_kind() {
        let ops = vec![
            op(OperationKind::Upload, "a", 1024 * 1024),
            op(OperationKind::Upload, "b", 1024 * 1024),
            op(OperationKind::Ignore, "c", 10),
            Operation::delete("d"),
        ];
        let stats = Statistics::from_operations(&ops);

        assert_eq!(stats.get(OperationKind::Upload), KindTally { count: 2, bytes: 2 * 1024 * 1024 });
        assert_eq!(stats.get(OperationKind::Upload).megabytes(), 2.0);
        assert_eq!(stats.get(OperationKind::Update), KindTally::default());
        assert_eq!(stats.pending(), 3);

        let order: Vec<_> = stats.rows().map(|(kind, _)| kind).collect();
        assert_eq!(
            order,
            [
                OperationKind::Delete,
                OperationKind::Update,
                OperationKind::Upload,
                OperationKind::Ignore
            ]
        );
    }

    #[test]
    fn index_keeps_only_successful_non_deletes() {
        let ops = vec![
            op(OperationKind::Upload, "uploaded", 1),
            op(OperationKind::Update, "failed", 1),
            op(OperationKind::Ignore, "unchanged", 1),
            Operation::delete("removed"),
        ];
        let outcomes = vec![
            OperationOutcome::Succeeded { attempts: 1 },
            OperationOutcome::Failed {
                attempts: 4,
                error: "boom".into(),
            },
            OperationOutcome::Skipped,
            OperationOutcome::Succeeded { attempts: 1 },
        ];

        let index = build_index(&ops, &outcomes);
        assert_eq!(
            index,
            RemoteIndex::from([
                ("unchanged".to_string(), "hash-unchanged".to_string()),
                ("uploaded".to_string(), "hash-uploaded".to_string()),
            ])
        );
    }

    #[test]
    fn summary_counts_ignored_files_as_successes() {
        let ops = [
            op(OperationKind::Upload, "ok", 1),
            op(OperationKind::Ignore, "same", 1),
            op(OperationKind::Update, "bad", 1),
            op(OperationKind::Unclassified, "stray", 1),
        ];
        let outcomes = [
            OperationOutcome::Succeeded { attempts: 2 },
            OperationOutcome::Skipped,
            OperationOutcome::Failed {
                attempts: 4,
                error: "timed out".into(),
            },
            OperationOutcome::Skipped,
        ];
        let summary = RunSummary::tally(ops.iter().zip(&outcomes), Duration::from_millis(1500));

        assert_eq!((summary.succeeded, summary.failed), (2, 1));
        assert!(!summary.is_success());
        assert_eq!(summary.failures[0].storage_key, "bad");
        assert_eq!(summary.failures[0].attempts, 4);
        assert_eq!(
            summary.to_string(),
            "Successfully completed 2 operations, 1 failed in 1.50s"
        );
    }

    #[test]
    fn clean_summary_message() {
        let summary = RunSummary::tally(std::iter::empty(), Duration::from_secs(125));
        assert!(summary.is_success());
        assert_eq!(
            summary.to_string(),
            "All 0 operations completed successfully in 2m 05s"
        );
    }
}
