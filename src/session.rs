//! Per-run state shared by the router and the gate.

use crate::config::{Config, Paths};
use anyhow::{anyhow, Result};
use dirs::home_dir;
use std::path::{Path, PathBuf};
use tracing::info;

/// Where the read-eval loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingInput,
    Dispatching,
    Terminated,
}

/// Mutable state for one run of the program.
///
/// The working directory is virtual: `cd` changes this value and commands
/// are spawned inside it, but the process's own directory never moves.
#[derive(Debug, Clone)]
pub struct Session {
    pub cwd: PathBuf,
    pub config: Config,
    pub api_key: Option<String>,
    pub paths: Paths,
}

impl Session {
    pub fn new(paths: Paths, config: Config, api_key: Option<String>, cwd: PathBuf) -> Self {
        Self {
            cwd,
            config,
            api_key,
            paths,
        }
    }

    /// Moves the session to `target` and returns the new directory.
    ///
    /// `~` expands to the home directory; relative paths resolve against the
    /// current session directory. On error the directory is unchanged.
    pub fn change_directory(&mut self, target: &str) -> Result<&Path> {
        let candidate = self.resolve(target)?;
        if !candidate.is_dir() {
            return Err(anyhow!("{}: no such directory", candidate.display()));
        }
        let resolved = candidate.canonicalize()?;
        info!("Changed directory to {}", resolved.display());
        self.cwd = resolved;
        Ok(&self.cwd)
    }

    fn resolve(&self, target: &str) -> Result<PathBuf> {
        let expanded = if target == "~" {
            home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?
        } else if let Some(rest) = target.strip_prefix("~/") {
            home_dir()
                .ok_or_else(|| anyhow!("Could not find home directory"))?
                .join(rest)
        } else {
            PathBuf::from(target)
        };
        Ok(self.cwd.join(expanded))
    }
}
