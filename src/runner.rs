//! Runs every configured policy in order, isolating failures per policy.

use crate::config::CleanupPolicy;
use crate::logger::LogSink;
use crate::sweep::{process_directory, SweepOptions, SweepStats};

/// Totals over a whole run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub stats: SweepStats,
    /// Policies whose tree was swept to completion
    pub completed: usize,
    /// Policies skipped because their root does not exist or is not a directory
    pub missing: usize,
    /// Policies aborted by an error partway through their tree
    pub failed: usize,
}

/// Clean every folder in `policies`, in order.
///
/// A missing root is logged and skipped; an error inside one tree is logged
/// and the run moves on to the next policy. Nothing here aborts the run.
pub fn clean_all_folders(
    policies: &[CleanupPolicy],
    options: SweepOptions,
    log: &mut dyn LogSink,
) -> RunSummary {
    let mut summary = RunSummary::default();

    for policy in policies {
        let root = &policy.root_path;

        if !root.exists() {
            log.error(&format!(
                "Configured directory does not exist: {}",
                root.display()
            ));
            summary.missing += 1;
            continue;
        }

        if !root.is_dir() {
            log.error(&format!(
                "Configured path is not a directory: {}",
                root.display()
            ));
            summary.missing += 1;
            continue;
        }

        log.info(&format!("Starting analysis of directory: {}", root.display()));

        // Work done before an abort still counts toward the totals
        let mut stats = SweepStats::default();
        let result = process_directory(root, policy, options, log, &mut stats);
        summary.stats.merge(&stats);

        match result {
            Ok(()) => {
                summary.completed += 1;
                log.info(&format!("Finished analysis of directory: {}", root.display()));
            }
            Err(err) => {
                summary.failed += 1;
                log.error(&format!(
                    "Cleaning aborted for {}: {:#}",
                    root.display(),
                    err
                ));
            }
        }
    }

    summary
}
