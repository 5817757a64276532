//! Append-only run log.
//!
//! The cleaning code only sees the [`LogSink`] trait. The binary owns a single
//! [`FileLog`] for the whole run; tests use [`MemoryLog`].

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use colored::Colorize;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Info => f.write_str("INFO"),
            Level::Error => f.write_str("ERROR"),
        }
    }
}

/// Destination for run messages
pub trait LogSink {
    fn info(&mut self, message: &str);
    fn error(&mut self, message: &str);
}

/// Format one log line: `[2024-05-01T10:00:00.000Z] [INFO] message`
pub fn format_line(level: Level, message: &str) -> String {
    format!(
        "[{}] [{}] {}",
        Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        level,
        message
    )
}

/// Log file opened once and appended to for the whole run.
///
/// Every line is also echoed to the console unless `console` is disabled.
pub struct FileLog {
    path: PathBuf,
    writer: BufWriter<File>,
    console: bool,
    write_failed: bool,
}

/// What [`FileLog::open`] had to create on disk
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LogSetup {
    pub created_dir: bool,
    pub created_file: bool,
}

impl FileLog {
    /// Open `path` for appending, creating the file and its parent directories if needed
    pub fn open(path: &Path) -> Result<(Self, LogSetup)> {
        let mut setup = LogSetup::default();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create log directory {}", parent.display())
                })?;
                setup.created_dir = true;
            }
        }

        setup.created_file = !path.exists();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;

        let log = FileLog {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            console: true,
            write_failed: false,
        };

        Ok((log, setup))
    }

    /// Enable or disable echoing lines to stdout/stderr
    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&mut self, level: Level, message: &str) {
        if self.console {
            match level {
                Level::Info => println!("{}", message),
                Level::Error => eprintln!("{}", message.red()),
            }
        }

        let line = format_line(level, message);
        let result = writeln!(self.writer, "{}", line).and_then(|_| self.writer.flush());

        // Report the first failure only, the run itself carries on
        if let Err(err) = result {
            if !self.write_failed {
                self.write_failed = true;
                eprintln!(
                    "{} could not write to log file {}: {}",
                    "Warning:".yellow().bold(),
                    self.path.display(),
                    err
                );
            }
        }
    }
}

impl LogSink for FileLog {
    fn info(&mut self, message: &str) {
        self.write(Level::Info, message);
    }

    fn error(&mut self, message: &str) {
        self.write(Level::Error, message);
    }
}

impl Drop for FileLog {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Collects messages in memory.
///
/// Test support: lets unit and integration tests inspect what a sweep logged
/// without touching a log file. The binary always uses [`FileLog`].
#[derive(Debug, Default)]
pub struct MemoryLog {
    pub entries: Vec<(Level, String)>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn infos(&self) -> impl Iterator<Item = &str> {
        self.messages(Level::Info)
    }

    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.messages(Level::Error)
    }

    /// True if any message at any level contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|(_, msg)| msg.contains(needle))
    }

    fn messages(&self, level: Level) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |(l, _)| *l == level)
            .map(|(_, msg)| msg.as_str())
    }
}

impl LogSink for MemoryLog {
    fn info(&mut self, message: &str) {
        self.entries.push((Level::Info, message.to_string()));
    }

    fn error(&mut self, message: &str) {
        self.entries.push((Level::Error, message.to_string()));
    }
}
