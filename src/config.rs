//! Configuration loading and data-directory layout.
//!
//! The config file is a flat list of `KEY=value` assignments:
//!
//! ```text
//! # ~/.termai/config
//! MAX_HISTORY=50
//! CONFIRM_DANGEROUS=true
//! STREAM_OUTPUT=false
//! MODEL="gemini-2.0-flash"
//! ```
//!
//! Lines that cannot be understood are logged and skipped; a broken line never
//! prevents the program from starting.

use crate::error::StartupError;
use anyhow::Result;
use dirs::home_dir;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Environment variable overriding the data directory.
pub const HOME_ENV: &str = "TERMAI_HOME";

/// Locations of every file the program reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    root: PathBuf,
}

impl Paths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves the data directory: explicit override, then `TERMAI_HOME`,
    /// then `~/.termai`.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, StartupError> {
        if let Some(root) = explicit {
            return Ok(Self::new(root));
        }
        if let Ok(root) = std::env::var(HOME_ENV) {
            if !root.is_empty() {
                return Ok(Self::new(root));
            }
        }
        let home = home_dir().ok_or(StartupError::NoHomeDirectory)?;
        Ok(Self::new(home.join(".termai")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config")
    }

    pub fn history_file(&self) -> PathBuf {
        self.root.join("history")
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.root.join("api_key")
    }

    pub fn denylist_file(&self) -> PathBuf {
        self.root.join("denylist.toml")
    }

    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Number of history lines shown by the `history` command.
    pub max_history: usize,
    pub confirm_dangerous: bool,
    pub stream_output: bool,
    pub model: String,
    /// Shell used to run commands; `None` means auto-detect at startup.
    pub shell: Option<String>,
    pub request_timeout_secs: u64,
    /// `0` disables the subprocess timeout.
    pub command_timeout_secs: u64,
    pub api_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_history: 100,
            confirm_dangerous: true,
            stream_output: true,
            model: DEFAULT_MODEL.to_string(),
            shell: None,
            request_timeout_secs: 30,
            command_timeout_secs: 600,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl Config {
    /// Loads the config file, or defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        info!("Loaded config from: {}", path.display());
        Ok(Self::parse(&content))
    }

    /// Parses config text on top of the defaults.
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();
        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                warn!("Config line {}: expected KEY=value, got {:?}", lineno + 1, line);
                continue;
            };
            if let Err(reason) = config.apply(key.trim(), unquote(value.trim())) {
                warn!("Config line {}: {}", lineno + 1, reason);
            }
        }
        config
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<(), String> {
        match key {
            "MAX_HISTORY" => self.max_history = parse_number(key, value)?,
            "CONFIRM_DANGEROUS" => self.confirm_dangerous = parse_bool(key, value)?,
            "STREAM_OUTPUT" => self.stream_output = parse_bool(key, value)?,
            "MODEL" => {
                if value.is_empty() {
                    return Err("MODEL must not be empty".to_string());
                }
                self.model = value.to_string();
            }
            "SHELL" => self.shell = (!value.is_empty()).then(|| value.to_string()),
            "REQUEST_TIMEOUT_SECS" => self.request_timeout_secs = parse_number(key, value)?,
            "COMMAND_TIMEOUT_SECS" => self.command_timeout_secs = parse_number(key, value)?,
            "API_BASE_URL" => {
                if value.is_empty() {
                    return Err("API_BASE_URL must not be empty".to_string());
                }
                self.api_base_url = value.trim_end_matches('/').to_string();
            }
            other => return Err(format!("unknown option {:?}", other)),
        }
        debug!("Config option {} = {}", key, value);
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout_secs > 0).then(|| Duration::from_secs(self.command_timeout_secs))
    }

    /// Writes the `config` command output.
    pub fn show_config_info(paths: &Paths, config: &Config, has_api_key: bool) {
        println!("Configuration file: {}", paths.config_file().display());
        if paths.config_file().exists() {
            println!("Status: Found");
        } else {
            println!("Status: Not found (using defaults)");
        }
        println!("History file: {}", paths.history_file().display());
        println!("Credential file: {}", paths.credentials_file().display());
        println!("Denylist file: {}", paths.denylist_file().display());
        println!("API Key: {}", if has_api_key { "Set" } else { "Not set" });
        println!();
        print!("{}", config);

        println!("\nTo set API key:");
        println!("  termai --set-api-key <your-key>");
        println!("\nOr set environment variable:");
        println!("  export GEMINI_API_KEY=<your-key>");
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "MAX_HISTORY={}", self.max_history)?;
        writeln!(f, "CONFIRM_DANGEROUS={}", self.confirm_dangerous)?;
        writeln!(f, "STREAM_OUTPUT={}", self.stream_output)?;
        writeln!(f, "MODEL={}", self.model)?;
        writeln!(f, "SHELL={}", self.shell.as_deref().unwrap_or("auto"))?;
        writeln!(f, "REQUEST_TIMEOUT_SECS={}", self.request_timeout_secs)?;
        writeln!(f, "COMMAND_TIMEOUT_SECS={}", self.command_timeout_secs)?;
        writeln!(f, "API_BASE_URL={}", self.api_base_url)
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn parse_bool(key: &str, value: &str) -> Result<bool, String> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(format!("{} expects true or false, got {:?}", key, value))
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("{} expects a non-negative integer, got {:?}", key, value))
}
