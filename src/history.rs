//! Append-only command history.
//!
//! Each executed (or attempted) command becomes one line:
//! `YYYY-MM-DD HH:MM:SS <command>`. The file is only ever appended to; the
//! running process never rewrites or truncates it.

use crate::providers::{SystemTimeProvider, TimeProvider};
use anyhow::Result;
use chrono::NaiveDateTime;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub recorded_at: NaiveDateTime,
    pub command: String,
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.recorded_at.format(TIMESTAMP_FORMAT), self.command)
    }
}

pub struct HistoryLog {
    path: PathBuf,
    time_provider: Box<dyn TimeProvider>,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_time_provider(path, Box::new(SystemTimeProvider))
    }

    /// Creates a log with a custom time provider (for testing).
    pub fn with_time_provider(path: impl Into<PathBuf>, time_provider: Box<dyn TimeProvider>) -> Self {
        Self {
            path: path.into(),
            time_provider,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates an empty history file if none exists yet.
    pub fn ensure_exists(&self) -> Result<()> {
        self.open_for_append()?;
        Ok(())
    }

    fn open_for_append(&self) -> Result<fs::File> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(OpenOptions::new().create(true).append(true).open(&self.path)?)
    }

    /// Records `command` with the current time.
    pub fn append(&self, command: &str) -> Result<HistoryEntry> {
        let entry = HistoryEntry {
            recorded_at: self.time_provider.now(),
            command: command.to_string(),
        };
        let mut file = self.open_for_append()?;
        // Embedded newlines would split one command across several entries.
        let line = entry.to_string().replace(['\n', '\r'], " ");
        writeln!(file, "{}", line)?;
        debug!("Appended history entry: {}", line);
        Ok(entry)
    }

    /// Returns the last `limit` lines, oldest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)?;
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let start = lines.len().saturating_sub(limit);
        Ok(lines[start..].iter().map(|l| l.to_string()).collect())
    }
}
