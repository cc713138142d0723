//! Heuristic classification of dangerous shell commands.
//!
//! A command is flagged when it contains any pattern of the set as a plain,
//! case-sensitive substring. There is no shell parsing: `dd` flags
//! `git add .` just as it flags `dd if=/dev/zero`. The check exists to make the
//! user look twice before a destructive command runs. It is **not** a sandbox
//! and is trivially bypassed by quoting, variables, aliases or any equivalent
//! command outside the pattern set.

use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Patterns flagged when no extension file replaces them.
pub const DEFAULT_PATTERNS: &[&str] = &[
    "rm -rf",
    "rm -fr",
    "mkfs",
    "dd",
    "chmod",
    "chown",
    "sudo",
    "> /dev/sda",
    "mkfs.ext4",
    "dd if=",
    "rm -rf /",
];

/// Contents of `denylist.toml`.
#[derive(Debug, Default, Deserialize)]
struct DenylistFile {
    #[serde(default)]
    patterns: Vec<String>,
    #[serde(default)]
    replace_defaults: bool,
}

#[derive(Debug, Clone)]
pub struct Denylist {
    patterns: Vec<String>,
}

impl Default for Denylist {
    fn default() -> Self {
        Self::new(DEFAULT_PATTERNS.iter().map(|p| p.to_string()))
    }
}

impl Denylist {
    /// Builds a denylist from arbitrary patterns. Empty patterns are dropped
    /// since they would match every command.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns = patterns
            .into_iter()
            .map(Into::into)
            .filter(|p: &String| !p.is_empty())
            .collect();
        Self { patterns }
    }

    /// Loads `denylist.toml`, falling back to the built-in set when the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let denylist = Self::from_toml(&content)?;
        info!(
            "Loaded denylist from {} ({} patterns)",
            path.display(),
            denylist.patterns.len()
        );
        Ok(denylist)
    }

    /// Like [`Self::load`], but a malformed file only produces a warning.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(denylist) => denylist,
            Err(e) => {
                warn!("Ignoring denylist file {}: {}", path.display(), e);
                eprintln!(
                    "Warning: could not read {} ({}); using built-in dangerous patterns.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    fn from_toml(content: &str) -> Result<Self> {
        let file: DenylistFile = toml::from_str(content)?;
        if file.replace_defaults {
            return Ok(Self::new(file.patterns));
        }
        let combined = DEFAULT_PATTERNS
            .iter()
            .map(|p| p.to_string())
            .chain(file.patterns);
        Ok(Self::new(combined))
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns the first pattern contained in `command`, if any.
    pub fn matched_pattern(&self, command: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|pattern| command.contains(pattern.as_str()))
            .map(String::as_str)
    }

    pub fn is_dangerous(&self, command: &str) -> bool {
        self.matched_pattern(command).is_some()
    }
}

/// Classifies `command` against the built-in pattern set.
pub fn is_dangerous(command: &str) -> bool {
    DEFAULT_PATTERNS.iter().any(|pattern| command.contains(pattern))
}
