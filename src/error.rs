//! Typed errors for the failure classes the session distinguishes.
//!
//! Everything else flows through `anyhow::Result`.

use std::time::Duration;
use thiserror::Error;

/// Why the model client produced no commands.
///
/// None of these are fatal: the session reports the error and keeps reading
/// input.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("No API key available. Use the 'api-key' command or set GEMINI_API_KEY.")]
    MissingApiKey,

    #[error("Could not reach the model endpoint: {0}")]
    Transport(String),

    #[error("Model request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("API Error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to extract commands from API response: {0}")]
    Parse(String),
}

/// Conditions that stop the program before the session loop starts.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("No usable shell found on PATH (tried: {0}). Install bash or sh, or set SHELL in the config file.")]
    ShellNotFound(String),

    #[error("Failed to initialise the HTTP client: {0}")]
    HttpClient(String),

    #[error("Could not determine the home directory. Use --home or TERMAI_HOME.")]
    NoHomeDirectory,

    #[error("No API key provided. Exiting.")]
    NoApiKey,
}
