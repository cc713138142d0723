//! Confirmation dialog for commands flagged as dangerous.

use anyhow::Result;
use std::io::{BufRead, Write};
use tracing::info;

/// The user's answer to a confirmation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consent {
    Approved,
    Declined,
}

/// Asks the user before a dangerous command runs.
///
/// Only `y` or `yes` (any case) approve. Anything else, including end of
/// input, declines.
pub struct PermissionUI;

impl PermissionUI {
    pub fn new() -> Self {
        Self
    }

    /// Shows the warning and reads one answer line from `input`.
    pub fn confirm_with_io<R: BufRead + ?Sized, W: Write + ?Sized>(
        &self,
        command: &str,
        matched_pattern: Option<&str>,
        input: &mut R,
        output: &mut W,
    ) -> Result<Consent> {
        writeln!(output, "Warning: This command might be dangerous.")?;
        writeln!(output, "  {}", command)?;
        if let Some(pattern) = matched_pattern {
            writeln!(output, "  (matched pattern {:?})", pattern)?;
        }
        write!(output, "Continue? (y/n): ")?;
        output.flush()?;

        let mut line = String::new();
        let read = input.read_line(&mut line)?;
        if read == 0 {
            writeln!(output)?;
        }

        let answer = line.trim();
        let consent = if answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes") {
            Consent::Approved
        } else {
            Consent::Declined
        };
        info!("Confirmation for {:?}: {:?}", command, consent);
        Ok(consent)
    }

    pub fn show_skipped_with_io<W: Write + ?Sized>(&self, command: &str, output: &mut W) -> Result<()> {
        writeln!(output, "Skipped: {}", command)?;
        Ok(())
    }
}

impl Default for PermissionUI {
    fn default() -> Self {
        Self::new()
    }
}
