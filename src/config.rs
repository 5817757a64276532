//! Retention policy loading from a TOML file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Retention policy for one directory tree.
///
/// Every directory below `root_path` is evaluated on its own with the same
/// keep count and extension set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CleanupPolicy {
    #[serde(rename = "path")]
    pub root_path: PathBuf,
    /// How many of the most recently created matching files survive in each directory
    pub keep_recent_files: usize,
    /// Dot-prefixed extensions, matched case-sensitively (e.g. ".log")
    pub extensions_to_delete: BTreeSet<String>,
}

impl CleanupPolicy {
    pub fn new<P, I, S>(root_path: P, keep_recent_files: usize, extensions: I) -> Self
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CleanupPolicy {
            root_path: root_path.into(),
            keep_recent_files,
            extensions_to_delete: extensions.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether an extension (including its leading dot) is on the allow-list
    pub fn allows_extension(&self, extension: &str) -> bool {
        self.extensions_to_delete.contains(extension)
    }

    fn validate(&self) -> Result<()> {
        if self.root_path.as_os_str().is_empty() {
            bail!("Folder entry has an empty path");
        }

        for ext in &self.extensions_to_delete {
            if !ext.starts_with('.') || ext.len() < 2 {
                bail!(
                    "Invalid extension '{}' for {}: extensions must start with '.' and name a suffix (e.g. \".log\"); a bare '.' is not supported",
                    ext,
                    self.root_path.display()
                );
            }
        }

        Ok(())
    }
}

/// The full set of policies, processed in file order
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub folders: Vec<CleanupPolicy>,
}

impl Config {
    /// Read, parse and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("Configuration file not found: {}", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;

        Self::from_toml(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Parse and validate configuration from TOML text.
    ///
    /// Relative folder paths are resolved against the current directory.
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(content).context("Failed to parse configuration TOML")?;

        if config.folders.is_empty() {
            bail!("Configuration is empty: no folders to clean");
        }

        for policy in &mut config.folders {
            policy.validate()?;
            policy.root_path = std::path::absolute(&policy.root_path).with_context(|| {
                format!("Failed to resolve path {}", policy.root_path.display())
            })?;
        }

        Ok(config)
    }
}
