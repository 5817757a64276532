//! Directory listing and retention selection for a single directory level.

use crate::config::CleanupPolicy;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A file seen during the current directory visit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    pub created: SystemTime,
    pub size: u64,
}

/// Direct children of a directory, each list in name order
#[derive(Debug, Default)]
pub struct DirListing {
    pub files: Vec<FileRecord>,
    pub subdirs: Vec<PathBuf>,
}

/// Result of applying a policy to one directory's files
#[derive(Debug, Default)]
pub struct Selection {
    /// Eligible files to remove, oldest first
    pub delete: Vec<FileRecord>,
    /// Eligible files inside the retention window, oldest first
    pub keep: Vec<FileRecord>,
    /// Files whose extension is not on the allow-list
    pub skipped: Vec<FileRecord>,
}

/// Extension of `path` with its leading dot (".txt").
///
/// Dotfiles without a further dot (".bashrc") have no extension. A trailing
/// dot ("notes.") yields ".", which never matches since policies reject a
/// bare "." extension.
pub fn file_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext))
}

/// Check if a file counts toward the policy's keep quota
pub fn is_eligible(path: &Path, policy: &CleanupPolicy) -> bool {
    file_extension(path).is_some_and(|ext| policy.allows_extension(&ext))
}

/// Creation time of a file, falling back to modification time where the
/// filesystem does not record birth time
pub fn creation_time(metadata: &fs::Metadata) -> Result<SystemTime> {
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .context("Filesystem reports neither creation nor modification time")
}

/// List the direct children of `dir`, split into files and subdirectories.
///
/// Entries are classified with `fs::metadata`, so symlinks count as whatever
/// they point to. Any entry that cannot be stat'ed fails the whole listing.
/// Anything that is neither a regular file nor a directory is ignored.
pub fn list_directory(dir: &Path) -> Result<DirListing> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?
    {
        let entry =
            entry.with_context(|| format!("Failed to read an entry of {}", dir.display()))?;
        paths.push(entry.path());
    }

    // read_dir order is platform dependent; sort so ties resolve the same way every run
    paths.sort();

    let mut listing = DirListing::default();
    for path in paths {
        let metadata = fs::metadata(&path)
            .with_context(|| format!("Could not get metadata for {}", path.display()))?;

        if metadata.is_dir() {
            listing.subdirs.push(path);
        } else if metadata.is_file() {
            let created = creation_time(&metadata)
                .with_context(|| format!("No timestamp for {}", path.display()))?;
            listing.files.push(FileRecord {
                path,
                created,
                size: metadata.len(),
            });
        }
    }

    Ok(listing)
}

/// Split `files` into delete / keep / skipped for one directory.
///
/// Eligible files are ordered oldest first with a stable sort, so equal
/// timestamps keep their incoming (name) order. Everything beyond the newest
/// `keep_recent_files` is selected for deletion.
pub fn select_for_deletion(files: Vec<FileRecord>, policy: &CleanupPolicy) -> Selection {
    let (mut eligible, skipped): (Vec<_>, Vec<_>) = files
        .into_iter()
        .partition(|file| is_eligible(&file.path, policy));

    eligible.sort_by_key(|file| file.created);

    let excess = eligible.len().saturating_sub(policy.keep_recent_files);
    let keep = eligible.split_off(excess);

    Selection {
        delete: eligible,
        keep,
        skipped,
    }
}
