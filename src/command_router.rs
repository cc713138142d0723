//! Routes each input line to a built-in or to the model, and runs the
//! read-eval loop.

use crate::builtins::{self, Builtin};
use crate::credentials::CredentialStore;
use crate::executor::{Executor, GateOutcome};
use crate::llm_generator::{CommandGenerator, GenerationRequest};
use crate::prompt::PromptBuilder;
use crate::session::{Session, SessionState};
use anyhow::Result;
use std::io::{self, BufRead, Write};
use tracing::{debug, error, info, warn};

pub struct CommandRouter {
    session: Session,
    generator: Box<dyn CommandGenerator>,
    executor: Executor,
    prompt_builder: PromptBuilder,
    state: SessionState,
}

impl CommandRouter {
    pub fn new(
        session: Session,
        generator: Box<dyn CommandGenerator>,
        executor: Executor,
        prompt_builder: PromptBuilder,
    ) -> Self {
        Self {
            session,
            generator,
            executor,
            prompt_builder,
            state: SessionState::AwaitingInput,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the loop on the process's stdio until `exit`, `quit` or end of
    /// input.
    pub async fn run(&mut self) -> Result<()> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        self.run_with_io(&mut input, &mut io::stdout(), &mut io::stderr()).await
    }

    pub async fn run_with_io<R, W1, W2>(&mut self, input: &mut R, stdout: &mut W1, stderr: &mut W2) -> Result<()>
    where
        R: BufRead + ?Sized,
        W1: Write + ?Sized,
        W2: Write + ?Sized,
    {
        self.state = SessionState::AwaitingInput;
        while self.state != SessionState::Terminated {
            write!(stdout, "\nWhat would you like me to do? ")?;
            stdout.flush()?;

            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                info!("End of input, leaving session");
                writeln!(stdout)?;
                self.state = SessionState::Terminated;
                break;
            }

            if let Err(e) = self.handle_line_with_io(&line, input, stdout, stderr).await {
                error!("Failed to handle {:?}: {:#}", line.trim(), e);
                writeln!(stderr, "Error: {:#}", e)?;
                self.state = SessionState::AwaitingInput;
            }
        }
        Ok(())
    }

    /// Handles one line: a built-in if it is one, otherwise a model task.
    /// Returns the state the loop moves to.
    pub async fn handle_line_with_io<R, W1, W2>(
        &mut self,
        line: &str,
        input: &mut R,
        stdout: &mut W1,
        stderr: &mut W2,
    ) -> Result<SessionState>
    where
        R: BufRead + ?Sized,
        W1: Write + ?Sized,
        W2: Write + ?Sized,
    {
        if let Some(builtin) = Builtin::parse(line) {
            debug!("Handling built-in {:?}", builtin);
            self.state = self.run_builtin_with_io(builtin, input, stdout, stderr)?;
            return Ok(self.state);
        }

        let task = line.trim();
        if task.is_empty() {
            return Ok(self.state);
        }

        self.state = SessionState::Dispatching;
        let result = self.dispatch_with_io(task, input, stdout, stderr).await;
        self.state = SessionState::AwaitingInput;
        result?;
        Ok(self.state)
    }

    fn run_builtin_with_io<R, W1, W2>(
        &mut self,
        builtin: Builtin,
        input: &mut R,
        stdout: &mut W1,
        stderr: &mut W2,
    ) -> Result<SessionState>
    where
        R: BufRead + ?Sized,
        W1: Write + ?Sized,
        W2: Write + ?Sized,
    {
        match builtin {
            Builtin::Help => builtins::show_help(stdout)?,
            Builtin::Exit => {
                writeln!(stdout, "Goodbye!")?;
                return Ok(SessionState::Terminated);
            }
            Builtin::Clear => builtins::clear_screen(stdout)?,
            Builtin::History => {
                let lines = self.executor.history().recent(self.session.config.max_history)?;
                if lines.is_empty() {
                    writeln!(stdout, "No history available.")?;
                }
                for line in lines {
                    writeln!(stdout, "{}", line)?;
                }
            }
            Builtin::Config => {
                writeln!(stdout, "Current Configuration:")?;
                write!(stdout, "{}", self.session.config)?;
            }
            Builtin::Pwd => writeln!(stdout, "{}", self.session.cwd.display())?,
            Builtin::ChangeDirectory(target) => match self.session.change_directory(&target) {
                Ok(cwd) => writeln!(stdout, "Changed directory to: {}", cwd.display())?,
                Err(e) => writeln!(stderr, "Error changing directory: {}", e)?,
            },
            Builtin::ApiKey => {
                let store = CredentialStore::new(self.session.paths.credentials_file());
                match store.prompt_and_save_with_io("Enter your new Gemini API key: ", input, stdout)? {
                    Some(key) => {
                        self.session.api_key = Some(key);
                        writeln!(stdout, "API key updated successfully")?;
                    }
                    None => writeln!(stdout, "API key unchanged")?,
                }
            }
        }
        Ok(SessionState::AwaitingInput)
    }

    /// Sends `task` to the model and passes every suggested command through
    /// the gate.
    async fn dispatch_with_io<R, W1, W2>(
        &mut self,
        task: &str,
        input: &mut R,
        stdout: &mut W1,
        stderr: &mut W2,
    ) -> Result<()>
    where
        R: BufRead + ?Sized,
        W1: Write + ?Sized,
        W2: Write + ?Sized,
    {
        info!("Dispatching task: {}", task);
        let prompt = self.prompt_builder.build(task, &self.session.cwd);

        // Progress goes to stderr so it can never be mistaken for output.
        writeln!(stderr, "Thinking...")?;
        let request = GenerationRequest {
            prompt: &prompt,
            model: &self.session.config.model,
            api_key: self.session.api_key.as_deref(),
        };
        let commands = match self.generator.generate(request).await {
            Ok(commands) => commands,
            Err(e) => {
                warn!("Generation failed: {}", e);
                writeln!(stderr, "{}", e)?;
                Vec::new()
            }
        };

        if commands.is_empty() {
            writeln!(stdout, "Sorry, I couldn't generate any commands for that request.")?;
            writeln!(
                stdout,
                "You can try rephrasing your request or check your API key if this continues."
            )?;
            return Ok(());
        }

        writeln!(stderr, "I'll run these commands for you:")?;
        let outcomes = self
            .executor
            .execute_batch_with_io(&commands, &self.session.cwd, &self.session.config, input, stdout, stderr)
            .await?;

        let skipped = outcomes.iter().filter(|o| **o == GateOutcome::Skipped).count();
        info!(
            "Batch finished: {} command(s), {} skipped",
            outcomes.len(),
            skipped
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Paths};
    use crate::denylist::Denylist;
    use crate::error::GenerationError;
    use crate::executor::{CommandOutput, CommandStatus, OutputMode, ProcessRunner};
    use crate::history::HistoryLog;
    use async_trait::async_trait;
    use std::io::Cursor;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Generator that records prompts and replies with fixed commands.
    #[derive(Clone, Default)]
    struct RecordingGenerator {
        reply: Vec<String>,
        unreachable: bool,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl CommandGenerator for RecordingGenerator {
        async fn generate(&self, request: GenerationRequest<'_>) -> Result<Vec<String>, GenerationError> {
            self.prompts.lock().unwrap().push(request.prompt.to_string());
            if self.unreachable {
                return Err(GenerationError::Transport("connection refused".to_string()));
            }
            Ok(self.reply.clone())
        }
    }

    #[derive(Clone, Default)]
    struct RecordingRunner {
        runs: Arc<Mutex<Vec<(String, std::path::PathBuf)>>>,
    }

    #[async_trait]
    impl ProcessRunner for RecordingRunner {
        async fn run(&self, command: &str, cwd: &Path, _mode: OutputMode) -> Result<CommandOutput> {
            self.runs.lock().unwrap().push((command.to_string(), cwd.to_path_buf()));
            Ok(CommandOutput {
                status: CommandStatus::Success,
                stdout: Vec::new(),
                stderr: Vec::new(),
            })
        }
    }

    struct Harness {
        dir: TempDir,
        generator: RecordingGenerator,
        runner: RecordingRunner,
        router: CommandRouter,
    }

    impl Harness {
        fn new(generator: RecordingGenerator) -> Self {
            let dir = TempDir::new().unwrap();
            let paths = Paths::new(dir.path().join(".termai"));
            let config = Config {
                max_history: 2,
                ..Config::default()
            };
            let runner = RecordingRunner::default();
            let executor = Executor::new(
                Box::new(runner.clone()),
                Denylist::default(),
                HistoryLog::new(paths.history_file()),
            );
            let session = Session::new(paths, config, Some("key".to_string()), dir.path().canonicalize().unwrap());
            let router = CommandRouter::new(
                session,
                Box::new(generator.clone()),
                executor,
                PromptBuilder::new("bash", "linux"),
            );
            Self {
                dir,
                generator,
                runner,
                router,
            }
        }

        fn replying(commands: &[&str]) -> Self {
            Self::new(RecordingGenerator {
                reply: commands.iter().map(|c| c.to_string()).collect(),
                ..RecordingGenerator::default()
            })
        }

        async fn line(&mut self, line: &str, answers: &str) -> (SessionState, String, String) {
            let mut input = Cursor::new(answers.as_bytes().to_vec());
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            let state = self
                .router
                .handle_line_with_io(line, &mut input, &mut stdout, &mut stderr)
                .await
                .unwrap();
            (
                state,
                String::from_utf8(stdout).unwrap(),
                String::from_utf8(stderr).unwrap(),
            )
        }

        fn prompt_count(&self) -> usize {
            self.generator.prompts.lock().unwrap().len()
        }
    }

    #[tokio::test]
    async fn test_pwd_is_builtin_and_never_reaches_model() {
        let mut harness = Harness::replying(&["echo should-not-run"]);

        let (state, stdout, _) = harness.line("pwd", "").await;

        assert_eq!(state, SessionState::AwaitingInput);
        assert_eq!(stdout.trim(), harness.dir.path().canonicalize().unwrap().display().to_string());
        assert_eq!(harness.prompt_count(), 0);
        assert!(harness.runner.runs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exit_and_quit_terminate() {
        let mut harness = Harness::replying(&[]);
        let (state, stdout, _) = harness.line("exit", "").await;
        assert_eq!(state, SessionState::Terminated);
        assert!(stdout.contains("Goodbye!"));

        let (state, _, _) = harness.line("quit", "").await;
        assert_eq!(state, SessionState::Terminated);
        assert_eq!(harness.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_task_is_sent_with_cwd_and_commands_run_in_order() {
        let mut harness = Harness::replying(&["ls", "pwd"]);

        let (state, stdout, stderr) = harness.line("list files", "").await;

        assert_eq!(state, SessionState::AwaitingInput);
        let prompts = harness.generator.prompts.lock().unwrap().clone();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("list files"));
        assert!(prompts[0].contains(&harness.dir.path().canonicalize().unwrap().display().to_string()));

        let runs = harness.runner.runs.lock().unwrap();
        let commands: Vec<&str> = runs.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(commands, vec!["ls", "pwd"]);
        assert!(stdout.contains("Executing: ls"));
        assert!(stderr.contains("Thinking..."));
        assert!(!stdout.contains("Thinking..."));
        assert_eq!(harness.router.state(), SessionState::AwaitingInput);
    }

    #[tokio::test]
    async fn test_unreachable_model_reports_and_keeps_session() {
        let mut harness = Harness::new(RecordingGenerator {
            unreachable: true,
            ..RecordingGenerator::default()
        });
        let cwd_before = harness.router.session().cwd.clone();

        let (state, stdout, stderr) = harness.line("show current directory", "").await;

        assert_eq!(state, SessionState::AwaitingInput);
        assert!(stdout.contains("couldn't generate any commands"));
        assert!(stderr.contains("connection refused"));
        assert_eq!(harness.router.session().cwd, cwd_before);
        assert!(harness.runner.runs.lock().unwrap().is_empty());

        // The next line is still handled normally.
        let (state, stdout, _) = harness.line("pwd", "").await;
        assert_eq!(state, SessionState::AwaitingInput);
        assert!(stdout.contains(&cwd_before.display().to_string()));
    }

    #[tokio::test]
    async fn test_empty_reply_reports_no_commands() {
        let mut harness = Harness::replying(&[]);
        let (_, stdout, _) = harness.line("do something odd", "").await;
        assert!(stdout.contains("couldn't generate any commands"));
    }

    #[tokio::test]
    async fn test_declined_dangerous_command_is_skipped_rest_of_batch_runs() {
        let mut harness = Harness::replying(&["echo a", "sudo rm -rf /", "echo b"]);

        harness.line("clean everything", "n\n").await;

        let runs = harness.runner.runs.lock().unwrap();
        let commands: Vec<&str> = runs.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(commands, vec!["echo a", "echo b"]);
    }

    #[tokio::test]
    async fn test_cd_changes_where_commands_run() {
        let mut harness = Harness::replying(&["ls"]);
        std::fs::create_dir(harness.dir.path().join("work")).unwrap();

        let (_, stdout, _) = harness.line("cd work", "").await;
        assert!(stdout.contains("Changed directory to:"));
        harness.line("list files", "").await;

        let expected = harness.dir.path().canonicalize().unwrap().join("work");
        assert_eq!(harness.runner.runs.lock().unwrap()[0].1, expected);
    }

    #[tokio::test]
    async fn test_cd_to_missing_directory_reports_error() {
        let mut harness = Harness::replying(&[]);
        let before = harness.router.session().cwd.clone();

        let (state, _, stderr) = harness.line("cd nowhere-at-all", "").await;

        assert_eq!(state, SessionState::AwaitingInput);
        assert!(stderr.contains("Error changing directory"));
        assert_eq!(harness.router.session().cwd, before);
    }

    #[tokio::test]
    async fn test_history_shows_configured_number_of_entries() {
        let mut harness = Harness::replying(&["echo 1", "echo 2", "echo 3"]);
        let (_, _, stderr) = harness.line("count to three", "").await;
        assert!(!stderr.contains("could not write history"), "history append failed: {}", stderr);

        let (_, stdout, _) = harness.line("history", "").await;

        let lines: Vec<&str> = stdout.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("echo 2"));
        assert!(lines[1].ends_with("echo 3"));
    }

    #[tokio::test]
    async fn test_history_when_empty() {
        let mut harness = Harness::replying(&[]);
        let (_, stdout, _) = harness.line("history", "").await;
        assert_eq!(stdout, "No history available.\n");
    }

    #[tokio::test]
    async fn test_config_lists_options() {
        let mut harness = Harness::replying(&[]);
        let (_, stdout, _) = harness.line("config", "").await;
        assert!(stdout.contains("MAX_HISTORY=2"));
        assert!(stdout.contains("MODEL=gemini-2.0-flash"));
    }

    #[tokio::test]
    async fn test_api_key_builtin_updates_session_and_store() {
        let mut harness = Harness::replying(&[]);

        let (_, stdout, _) = harness.line("api-key", "new-key\n").await;

        assert!(stdout.contains("API key updated successfully"));
        assert_eq!(harness.router.session().api_key.as_deref(), Some("new-key"));
        let store = CredentialStore::new(harness.router.session().paths.credentials_file());
        assert_eq!(store.load().unwrap().as_deref(), Some("new-key"));
    }

    #[tokio::test]
    async fn test_blank_line_does_nothing() {
        let mut harness = Harness::replying(&["ls"]);
        let (state, stdout, _) = harness.line("   \n", "").await;
        assert_eq!(state, SessionState::AwaitingInput);
        assert!(stdout.is_empty());
        assert_eq!(harness.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_run_loop_stops_at_exit() {
        let mut harness = Harness::replying(&["echo hi"]);
        let mut input = Cursor::new(b"say hi\nexit\nsay hi\n".to_vec());
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        harness
            .router
            .run_with_io(&mut input, &mut stdout, &mut stderr)
            .await
            .unwrap();

        assert_eq!(harness.prompt_count(), 1);
        assert!(String::from_utf8(stdout).unwrap().contains("Goodbye!"));
        assert_eq!(harness.router.state(), SessionState::Terminated);
    }

    #[tokio::test]
    async fn test_run_loop_stops_at_end_of_input() {
        let mut harness = Harness::replying(&[]);
        let mut input = Cursor::new(b"pwd\n".to_vec());
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();

        harness
            .router
            .run_with_io(&mut input, &mut stdout, &mut stderr)
            .await
            .unwrap();

        let text = String::from_utf8(stdout).unwrap();
        assert_eq!(text.matches("What would you like me to do?").count(), 2);
        assert_eq!(harness.router.state(), SessionState::Terminated);
    }
}
