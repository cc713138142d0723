//! Persisted API credential.
//!
//! The credential file holds the raw key and nothing else. On unix it is
//! created readable and writable by the owner only.

use anyhow::Result;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable that takes precedence over the stored key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored key. A missing or blank file yields `None`.
    pub fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let key = fs::read_to_string(&self.path)?;
        let key = key.trim();
        Ok((!key.is_empty()).then(|| key.to_string()))
    }

    /// Environment first, then the stored key.
    pub fn resolve(&self) -> Result<Option<String>> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            let key = key.trim();
            if !key.is_empty() {
                return Ok(Some(key.to_string()));
            }
        }
        self.load()
    }

    /// Replaces the stored key.
    pub fn save(&self, api_key: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = Self::open_private(&self.path)?;
        file.write_all(api_key.trim().as_bytes())?;
        info!("Saved API key to: {}", self.path.display());
        Ok(())
    }

    /// Asks for a key on `output`, reads one line from `input` and stores it.
    /// A blank answer stores nothing and yields `None`.
    pub fn prompt_and_save_with_io<R, W>(&self, question: &str, input: &mut R, output: &mut W) -> Result<Option<String>>
    where
        R: BufRead + ?Sized,
        W: Write + ?Sized,
    {
        write!(output, "{}", question)?;
        output.flush()?;
        let mut line = String::new();
        input.read_line(&mut line)?;
        let key = line.trim();
        if key.is_empty() {
            return Ok(None);
        }
        self.save(key)?;
        Ok(Some(key.to_string()))
    }

    #[cfg(unix)]
    fn open_private(path: &Path) -> Result<fs::File> {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        let file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        // `mode` only applies on creation; tighten a pre-existing file too.
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
        Ok(file)
    }

    #[cfg(not(unix))]
    fn open_private(path: &Path) -> Result<fs::File> {
        Ok(fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?)
    }
}
