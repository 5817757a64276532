//! Recursive per-directory retention sweep.

use crate::config::CleanupPolicy;
use crate::logger::LogSink;
use crate::selection::{list_directory, select_for_deletion, FileRecord};

use anyhow::{bail, Result};
use colored::Colorize;
use std::fs;
use std::path::Path;

/// Runtime flags for a sweep
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepOptions {
    /// Report what would be deleted without touching the filesystem
    pub simulate: bool,
    /// Print kept and skipped files to the console
    pub verbose: bool,
}

/// What happened to a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionOutcome {
    Deleted,
    Simulated,
    Skipped,
    Kept,
    Failed,
}

/// Counters accumulated over a sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepStats {
    pub directories: usize,
    pub eligible: usize,
    pub deleted: usize,
    pub simulated: usize,
    pub kept: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Bytes removed, or that would be removed in simulate mode
    pub reclaimed_bytes: u64,
}

impl SweepStats {
    pub fn record(&mut self, outcome: DeletionOutcome, file: &FileRecord) {
        match outcome {
            DeletionOutcome::Deleted => {
                self.deleted += 1;
                self.reclaimed_bytes += file.size;
            }
            DeletionOutcome::Simulated => {
                self.simulated += 1;
                self.reclaimed_bytes += file.size;
            }
            DeletionOutcome::Skipped => self.skipped += 1,
            DeletionOutcome::Kept => self.kept += 1,
            DeletionOutcome::Failed => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: &SweepStats) {
        self.directories += other.directories;
        self.eligible += other.eligible;
        self.deleted += other.deleted;
        self.simulated += other.simulated;
        self.kept += other.kept;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.reclaimed_bytes += other.reclaimed_bytes;
    }
}

/// Apply `policy` to `dir` and, recursively, to every directory below it.
///
/// Each directory is evaluated on its own: deletions for the current level
/// are carried out before any subdirectory is visited, and subdirectories are
/// visited in name order whether or not anything was deleted here. A failed
/// file deletion is counted and the batch continues. A directory that cannot
/// be listed aborts the rest of this call and is returned as an error; `stats`
/// still holds everything done before the failure.
pub fn process_directory(
    dir: &Path,
    policy: &CleanupPolicy,
    options: SweepOptions,
    log: &mut dyn LogSink,
    stats: &mut SweepStats,
) -> Result<()> {
    let listing = match list_directory(dir) {
        Ok(listing) => listing,
        Err(err) => {
            log.error(&format!(
                "Failed to analyse directory {}: {:#}",
                dir.display(),
                err
            ));
            return Err(err);
        }
    };
    stats.directories += 1;

    let selection = select_for_deletion(listing.files, policy);
    stats.eligible += selection.delete.len() + selection.keep.len();

    apply_deletions(&selection.delete, options, log, stats);

    for file in &selection.keep {
        if options.verbose {
            println!("  {} {}", "Keeping".green(), file.path.display());
        }
        stats.record(DeletionOutcome::Kept, file);
    }

    for file in &selection.skipped {
        if options.verbose {
            println!("  {} {}", "Skipping".dimmed(), file.path.display());
        }
        stats.record(DeletionOutcome::Skipped, file);
    }

    for subdir in &listing.subdirs {
        process_directory(subdir, policy, options, log, stats)?;
    }

    log.info(&format!("Finished analysing directory {}", dir.display()));
    Ok(())
}

/// Delete (or report, when simulating) every file in `files`.
///
/// A failure is recorded and the remaining files are still attempted.
pub fn apply_deletions(
    files: &[FileRecord],
    options: SweepOptions,
    log: &mut dyn LogSink,
    stats: &mut SweepStats,
) {
    for file in files {
        let outcome = if options.simulate {
            log.info(&format!("Would delete (simulation): {}", file.path.display()));
            DeletionOutcome::Simulated
        } else {
            match delete_file(&file.path, log) {
                Ok(()) => DeletionOutcome::Deleted,
                Err(_) => DeletionOutcome::Failed,
            }
        };
        stats.record(outcome, file);
    }
}

/// Delete a single file.
///
/// The file must still exist: one that vanished since it was listed is
/// reported as an error rather than treated as already deleted.
pub fn delete_file(path: &Path, log: &mut dyn LogSink) -> Result<()> {
    log.info(&format!("Deleting file: {}", path.display()));

    if !path.exists() {
        let message = format!("File does not exist: {}", path.display());
        log.error(&message);
        bail!(message);
    }

    match fs::remove_file(path) {
        Ok(()) => {
            log.info(&format!("Deleted file: {}", path.display()));
            Ok(())
        }
        Err(err) => {
            let message = format!("Failed to delete file {}: {}", path.display(), err);
            log.error(&message);
            Err(anyhow::Error::new(err).context(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::MemoryLog;
    use std::path::PathBuf;
    use std::thread::sleep;
    use std::time::Duration;

    /// Create files in order with a gap so creation times are strictly increasing
    fn create_in_order(dir: &Path, names: &[&str]) {
        for name in names {
            fs::write(dir.join(name), name.as_bytes()).unwrap();
            sleep(Duration::from_millis(20));
        }
    }

    fn policy(root: &Path, keep: usize, exts: &[&str]) -> CleanupPolicy {
        CleanupPolicy::new(root, keep, exts.iter().copied())
    }

    fn sweep(
        dir: &Path,
        policy: &CleanupPolicy,
        options: SweepOptions,
        log: &mut dyn LogSink,
    ) -> Result<SweepStats> {
        let mut stats = SweepStats::default();
        process_directory(dir, policy, options, log, &mut stats)?;
        Ok(stats)
    }

    fn real() -> SweepOptions {
        SweepOptions::default()
    }

    fn simulate() -> SweepOptions {
        SweepOptions {
            simulate: true,
            verbose: false,
        }
    }

    #[test]
    fn test_keeps_newest_and_deletes_rest() {
        let dir = tempfile::tempdir().unwrap();
        create_in_order(dir.path(), &["a.txt", "b.txt", "c.txt"]);

        let mut log = MemoryLog::new();
        let stats =
            sweep(dir.path(), &policy(dir.path(), 1, &[".txt"]), real(), &mut log)
                .unwrap();

        assert!(!dir.path().join("a.txt").exists());
        assert!(!dir.path().join("b.txt").exists());
        assert!(dir.path().join("c.txt").exists());
        assert_eq!(stats.deleted, 2);
        assert_eq!(stats.kept, 1);
        assert_eq!(stats.reclaimed_bytes, 10);
        assert!(log.contains("Deleted file:"));
        assert_eq!(log.errors().count(), 0);
    }

    #[test]
    fn test_unlisted_extension_untouched() {
        let dir = tempfile::tempdir().unwrap();
        create_in_order(dir.path(), &["a.txt", "b.txt"]);

        let mut log = MemoryLog::new();
        let stats =
            sweep(dir.path(), &policy(dir.path(), 1, &[".whtt"]), real(), &mut log)
                .unwrap();

        assert!(dir.path().join("a.txt").exists());
        assert!(dir.path().join("b.txt").exists());
        assert_eq!(stats.deleted, 0);
        assert_eq!(stats.skipped, 2);
    }

    #[test]
    fn test_each_subdirectory_keeps_its_own_newest() {
        let dir = tempfile::tempdir().unwrap();
        let sub1 = dir.path().join("sub1");
        let sub2 = dir.path().join("sub2");
        fs::create_dir(&sub1).unwrap();
        fs::create_dir(&sub2).unwrap();
        create_in_order(&sub1, &["old.txt", "new.txt"]);
        create_in_order(&sub2, &["old.txt", "new.txt"]);

        let mut log = MemoryLog::new();
        let stats =
            sweep(dir.path(), &policy(dir.path(), 1, &[".txt"]), real(), &mut log)
                .unwrap();

        for sub in [&sub1, &sub2] {
            assert!(!sub.join("old.txt").exists());
            assert!(sub.join("new.txt").exists());
        }
        assert_eq!(stats.deleted, 2);
        assert_eq!(stats.kept, 2);
        assert_eq!(stats.directories, 3);
    }

    #[test]
    fn test_simulate_leaves_filesystem_alone() {
        let dir = tempfile::tempdir().unwrap();
        create_in_order(dir.path(), &["a.txt", "b.txt", "c.txt"]);

        let mut log = MemoryLog::new();
        let stats = sweep(
            dir.path(),
            &policy(dir.path(), 1, &[".txt"]),
            simulate(),
            &mut log,
        )
        .unwrap();

        for name in ["a.txt", "b.txt", "c.txt"] {
            assert!(dir.path().join(name).exists());
        }
        assert_eq!(stats.simulated, 2);
        assert_eq!(stats.deleted, 0);

        let reported: Vec<_> = log
            .infos()
            .filter(|m| m.starts_with("Would delete"))
            .collect();
        assert_eq!(reported.len(), 2);
        assert!(reported[0].ends_with("a.txt"));
        assert!(reported[1].ends_with("b.txt"));
    }

    #[test]
    fn test_simulate_reports_what_real_run_deletes() {
        let simulated = tempfile::tempdir().unwrap();
        let deleted = tempfile::tempdir().unwrap();
        for root in [simulated.path(), deleted.path()] {
            fs::create_dir(root.join("nested")).unwrap();
            create_in_order(root, &["1.log", "2.log", "3.log"]);
            create_in_order(&root.join("nested"), &["x.log", "y.log", "z.md"]);
        }

        let mut sim_log = MemoryLog::new();
        sweep(
            simulated.path(),
            &policy(simulated.path(), 1, &[".log"]),
            simulate(),
            &mut sim_log,
        )
        .unwrap();

        let mut real_log = MemoryLog::new();
        sweep(
            deleted.path(),
            &policy(deleted.path(), 1, &[".log"]),
            real(),
            &mut real_log,
        )
        .unwrap();

        let relative = |log: &MemoryLog, prefix: &str, root: &Path| -> Vec<PathBuf> {
            log.infos()
                .filter_map(|m| m.strip_prefix(prefix))
                .map(|p| Path::new(p).strip_prefix(root).unwrap().to_path_buf())
                .collect()
        };

        assert_eq!(
            relative(&sim_log, "Would delete (simulation): ", simulated.path()),
            relative(&real_log, "Deleted file: ", deleted.path())
        );
    }

    #[test]
    fn test_visits_empty_and_ineligible_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        fs::create_dir_all(dir.path().join("docs/deeper/deepest")).unwrap();
        fs::write(dir.path().join("docs/readme.md"), "x").unwrap();

        let mut log = MemoryLog::new();
        let stats =
            sweep(dir.path(), &policy(dir.path(), 0, &[".txt"]), real(), &mut log)
                .unwrap();

        assert_eq!(stats.directories, 5);
        assert_eq!(
            log.infos()
                .filter(|m| m.starts_with("Finished analysing directory"))
                .count(),
            5
        );
        assert!(dir.path().join("docs/readme.md").exists());
        assert!(dir.path().join("docs/deeper/deepest").is_dir());
    }

    #[test]
    fn test_current_level_deleted_before_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("a_sub")).unwrap();
        create_in_order(&dir.path().join("a_sub"), &["inner1.tmp", "inner2.tmp"]);
        create_in_order(dir.path(), &["outer1.tmp", "outer2.tmp"]);

        let mut log = MemoryLog::new();
        sweep(dir.path(), &policy(dir.path(), 1, &[".tmp"]), real(), &mut log)
            .unwrap();

        let order: Vec<_> = log
            .infos()
            .filter(|m| m.starts_with("Deleted file:"))
            .collect();
        assert_eq!(order.len(), 2);
        assert!(order[0].ends_with("outer1.tmp"));
        assert!(order[1].ends_with("inner1.tmp"));
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone");

        let mut log = MemoryLog::new();
        let result = sweep(&missing, &policy(&missing, 1, &[".txt"]), real(), &mut log);

        assert!(result.is_err());
        assert!(log.errors().any(|m| m.contains("Failed to analyse directory")));
    }

    #[test]
    fn test_delete_file_missing_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vanished.txt");

        let mut log = MemoryLog::new();
        let result = delete_file(&path, &mut log);

        assert!(result.is_err());
        assert!(log.errors().any(|m| m.starts_with("File does not exist")));
    }

    #[test]
    fn test_delete_file_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("present.txt");
        fs::write(&path, "x").unwrap();

        let mut log = MemoryLog::new();
        delete_file(&path, &mut log).unwrap();

        assert!(!path.exists());
        assert!(log.infos().any(|m| m.starts_with("Deleted file:")));
    }

    #[test]
    fn test_delete_failure_is_error() {
        // A directory named like a file cannot be removed with remove_file
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("looks_like.txt");
        fs::create_dir(&path).unwrap();

        let mut log = MemoryLog::new();
        let result = delete_file(&path, &mut log);

        assert!(result.is_err());
        assert!(path.exists());
        assert!(log.errors().any(|m| m.starts_with("Failed to delete file")));
    }

    #[test]
    fn test_failed_deletion_does_not_stop_batch() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.log");
        fs::write(&present, "12345").unwrap();

        let batch = vec![
            FileRecord {
                path: dir.path().join("vanished.log"),
                created: std::time::SystemTime::UNIX_EPOCH,
                size: 7,
            },
            FileRecord {
                path: present.clone(),
                created: std::time::SystemTime::UNIX_EPOCH,
                size: 5,
            },
        ];

        let mut log = MemoryLog::new();
        let mut stats = SweepStats::default();
        apply_deletions(&batch, real(), &mut log, &mut stats);

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.reclaimed_bytes, 5);
        assert!(!present.exists());
        assert!(log.errors().any(|m| m.starts_with("File does not exist")));
    }

    #[test]
    fn test_simulated_batch_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.log");
        fs::write(&path, "x").unwrap();

        let batch = vec![FileRecord {
            path: path.clone(),
            created: std::time::SystemTime::UNIX_EPOCH,
            size: 1,
        }];

        let mut log = MemoryLog::new();
        let mut stats = SweepStats::default();
        apply_deletions(&batch, simulate(), &mut log, &mut stats);

        assert!(path.exists());
        assert_eq!(stats.simulated, 1);
        assert!(!log.contains("Deleting file:"));
    }

    #[cfg(unix)]
    #[test]
    fn test_listing_failure_keeps_earlier_stats() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        create_in_order(dir.path(), &["a.tmp", "b.tmp"]);
        fs::create_dir(dir.path().join("zbad")).unwrap();
        symlink(dir.path().join("nowhere"), dir.path().join("zbad/dangling")).unwrap();

        let mut log = MemoryLog::new();
        let mut stats = SweepStats::default();
        let result = process_directory(
            dir.path(),
            &policy(dir.path(), 0, &[".tmp"]),
            real(),
            &mut log,
            &mut stats,
        );

        assert!(result.is_err());
        assert_eq!(stats.deleted, 2);
        assert_eq!(stats.directories, 1);
    }

    #[test]
    fn test_stats_merge() {
        let mut a = SweepStats {
            directories: 1,
            deleted: 2,
            reclaimed_bytes: 100,
            ..Default::default()
        };
        let b = SweepStats {
            directories: 2,
            failed: 1,
            reclaimed_bytes: 50,
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.directories, 3);
        assert_eq!(a.deleted, 2);
        assert_eq!(a.failed, 1);
        assert_eq!(a.reclaimed_bytes, 150);
    }
}
