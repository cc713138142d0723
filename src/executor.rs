//! Guarded execution of generated commands.
//!
//! Every candidate passes the same gate, in order:
//!
//! 1. dangerous commands need an explicit `y` when confirmation is enabled;
//! 2. the command is appended to history *before* it runs, so failed
//!    attempts are recorded too;
//! 3. it runs through `<shell> -c` in the session's working directory, with
//!    output either streamed live or buffered and printed after exit;
//! 4. a failure is reported and the next candidate still runs.

use crate::config::Config;
use crate::denylist::Denylist;
use crate::error::StartupError;
use crate::history::HistoryLog;
use crate::permission_ui::{Consent, PermissionUI};
use anyhow::Result;
use async_trait::async_trait;
use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tracing::{error, info, warn};

/// Shells tried, in order, when none is configured.
pub const SHELL_CANDIDATES: &[&str] = &["bash", "sh"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Child inherits the terminal; output appears as it is produced.
    Stream,
    /// Output is captured and handed back after the child exits.
    Buffer,
}

impl OutputMode {
    pub fn from_config(config: &Config) -> Self {
        if config.stream_output {
            Self::Stream
        } else {
            Self::Buffer
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    /// Non-zero exit; `None` when the child was killed by a signal.
    Failed(Option<i32>),
    TimedOut(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: CommandStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// What the gate did with one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// The user declined the confirmation; nothing was recorded or run.
    Skipped,
    Completed(CommandStatus),
    /// The shell could not be started.
    SpawnFailed(String),
}

// =============================================================================
// Traits for Dependency Injection
// =============================================================================

/// Trait for running shell commands.
///
/// This abstraction enables testing without spawning real processes.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Runs `command` in `cwd`. In [`OutputMode::Stream`] the returned
    /// buffers are empty.
    async fn run(&self, command: &str, cwd: &Path, mode: OutputMode) -> Result<CommandOutput>;
}

// =============================================================================
// Default Implementation
// =============================================================================

/// Runs commands through a shell subprocess with an optional time limit.
pub struct ShellProcessRunner {
    shell: String,
    timeout: Option<Duration>,
}

impl ShellProcessRunner {
    pub fn new(shell: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            shell: shell.into(),
            timeout,
        }
    }

    pub fn shell(&self) -> &str {
        &self.shell
    }

    /// Finds the shell to use: the configured one if given, otherwise the
    /// first of [`SHELL_CANDIDATES`] on PATH.
    pub fn detect_shell(configured: Option<&str>) -> Result<String, StartupError> {
        let candidates: Vec<&str> = match configured {
            Some(shell) => vec![shell],
            None => SHELL_CANDIDATES.to_vec(),
        };
        candidates
            .iter()
            .find_map(|candidate| which::which(candidate).ok())
            .map(|path| path.to_string_lossy().into_owned())
            .ok_or_else(|| StartupError::ShellNotFound(candidates.join(", ")))
    }
}

#[async_trait]
impl ProcessRunner for ShellProcessRunner {
    async fn run(&self, command: &str, cwd: &Path, mode: OutputMode) -> Result<CommandOutput> {
        let mut cmd = tokio::process::Command::new(&self.shell);
        cmd.arg("-c").arg(command).current_dir(cwd).kill_on_drop(true);
        // A bounded command leads its own process group so a timeout can stop
        // everything it started. Streaming from a terminal keeps the
        // terminal's group, or interactive programs would stop on SIGTTIN.
        let own_group = self.timeout.is_some()
            && !(mode == OutputMode::Stream && std::io::stdin().is_terminal());
        #[cfg(unix)]
        if own_group {
            cmd.process_group(0);
        }
        match mode {
            OutputMode::Stream => {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
            OutputMode::Buffer => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped());
            }
        }

        let child = cmd.spawn()?;
        let pid = child.id();
        let waiting = child.wait_with_output();
        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, waiting).await {
                Ok(output) => output?,
                Err(_) => {
                    if own_group {
                        kill_process_group(pid);
                    } else {
                        warn!("Only the shell was killed; jobs it started in the background may still run");
                    }
                    warn!("Command exceeded {:?}, killed: {}", limit, command);
                    return Ok(CommandOutput {
                        status: CommandStatus::TimedOut(limit),
                        stdout: Vec::new(),
                        stderr: Vec::new(),
                    });
                }
            },
            None => waiting.await?,
        };

        let status = if output.status.success() {
            CommandStatus::Success
        } else {
            CommandStatus::Failed(output.status.code())
        };
        Ok(CommandOutput {
            status,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Kills the process group led by `pid`. The shell itself is also killed when
/// its future is dropped.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        warn!("Failed to kill process group {}: {}", pid, e);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

// =============================================================================
// Executor Implementation
// =============================================================================

/// The execution gate.
///
/// # Example
///
/// ```ignore
/// let executor = Executor::new(
///     Box::new(ShellProcessRunner::new("bash", None)),
///     Denylist::default(),
///     HistoryLog::new("/home/u/.termai/history"),
/// );
/// executor
///     .execute_batch_with_io(&commands, &cwd, &config, &mut input, &mut stdout, &mut stderr)
///     .await?;
/// ```
pub struct Executor {
    runner: Box<dyn ProcessRunner>,
    denylist: Denylist,
    history: HistoryLog,
    permission_ui: PermissionUI,
}

impl Executor {
    pub fn new(runner: Box<dyn ProcessRunner>, denylist: Denylist, history: HistoryLog) -> Self {
        Self {
            runner,
            denylist,
            history,
            permission_ui: PermissionUI::new(),
        }
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    /// Runs every candidate in order. One candidate failing never stops the
    /// rest.
    pub async fn execute_batch_with_io<R, W1, W2>(
        &self,
        commands: &[String],
        cwd: &Path,
        config: &Config,
        input: &mut R,
        stdout: &mut W1,
        stderr: &mut W2,
    ) -> Result<Vec<GateOutcome>>
    where
        R: BufRead + ?Sized,
        W1: Write + ?Sized,
        W2: Write + ?Sized,
    {
        let mut outcomes = Vec::with_capacity(commands.len());
        for command in commands {
            let outcome = self
                .execute_with_io(command, cwd, config, input, stdout, stderr)
                .await?;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Runs one candidate through the gate.
    ///
    /// Errors are only returned when writing to the terminal fails; command
    /// failures are reported and returned as a [`GateOutcome`].
    pub async fn execute_with_io<R, W1, W2>(
        &self,
        command: &str,
        cwd: &Path,
        config: &Config,
        input: &mut R,
        stdout: &mut W1,
        stderr: &mut W2,
    ) -> Result<GateOutcome>
    where
        R: BufRead + ?Sized,
        W1: Write + ?Sized,
        W2: Write + ?Sized,
    {
        if config.confirm_dangerous {
            if let Some(pattern) = self.denylist.matched_pattern(command) {
                let consent = self
                    .permission_ui
                    .confirm_with_io(command, Some(pattern), input, stdout)?;
                if consent == Consent::Declined {
                    self.permission_ui.show_skipped_with_io(command, stdout)?;
                    return Ok(GateOutcome::Skipped);
                }
            }
        }

        if let Err(e) = self.history.append(command) {
            warn!("Failed to record history entry: {}", e);
            writeln!(stderr, "Warning: could not write history: {}", e)?;
        }

        writeln!(stdout, "Executing: {}", command)?;
        stdout.flush()?;

        let mode = OutputMode::from_config(config);
        info!("Running {:?} in {} ({:?})", command, cwd.display(), mode);
        let output = match self.runner.run(command, cwd, mode).await {
            Ok(output) => output,
            Err(e) => {
                error!("Failed to start command {:?}: {}", command, e);
                writeln!(stderr, "Error executing command: {}", e)?;
                return Ok(GateOutcome::SpawnFailed(e.to_string()));
            }
        };

        Self::handle_output(&output, stdout, stderr)?;
        Ok(GateOutcome::Completed(output.status))
    }

    /// Prints buffered output and reports unsuccessful exits.
    fn handle_output<W1, W2>(output: &CommandOutput, stdout: &mut W1, stderr: &mut W2) -> Result<()>
    where
        W1: Write + ?Sized,
        W2: Write + ?Sized,
    {
        if !output.stdout.is_empty() {
            stdout.write_all(&output.stdout)?;
            stdout.flush()?;
        }
        if !output.stderr.is_empty() {
            stderr.write_all(&output.stderr)?;
        }

        match &output.status {
            CommandStatus::Success => {}
            CommandStatus::Failed(Some(code)) => {
                warn!("Command failed with exit code {}", code);
                writeln!(stderr, "Command exited with status {}", code)?;
            }
            CommandStatus::Failed(None) => {
                warn!("Command terminated by a signal");
                writeln!(stderr, "Command was terminated by a signal")?;
            }
            CommandStatus::TimedOut(limit) => {
                writeln!(stderr, "Command timed out after {}s and was stopped", limit.as_secs())?;
            }
        }
        Ok(())
    }
}
