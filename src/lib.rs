//! retention-sweep - Per-directory retention cleaner
//!
//! For each configured folder, retention-sweep walks the whole tree and, in every
//! directory on its own, deletes the oldest files whose extension is on the
//! folder's allow-list, keeping the `keep_recent_files` most recently created
//! ones. Other files and directories are never touched.
//!
//! ## Layout
//!
//! - `config`: TOML policy file loading and validation
//! - `selection`: directory listing and the keep/delete split for one level
//! - `sweep`: recursive traversal and file deletion
//! - `runner`: runs all policies in order, isolating failures per policy
//! - `logger`: the append-only run log

pub mod config;
pub mod logger;
pub mod runner;
pub mod selection;
pub mod sweep;

// Re-export commonly used items
pub use config::{CleanupPolicy, Config};
pub use logger::{FileLog, Level, LogSetup, LogSink, MemoryLog};
pub use runner::{clean_all_folders, RunSummary};
pub use selection::{
    file_extension, is_eligible, list_directory, select_for_deletion, DirListing, FileRecord,
    Selection,
};
pub use sweep::{
    apply_deletions, delete_file, process_directory, DeletionOutcome, SweepOptions, SweepStats,
};
