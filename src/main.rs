use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use termai::builtins;
use termai::command_router::CommandRouter;
use termai::config::{Config, Paths};
use termai::credentials::CredentialStore;
use termai::denylist::Denylist;
use termai::error::StartupError;
use termai::executor::{Executor, ShellProcessRunner};
use termai::history::HistoryLog;
use termai::http_client::ReqwestHttpClient;
use termai::llm_generator::{CommandGenerator, GeminiGenerator, MOCK_ENV, MockGenerator};
use termai::prompt::PromptBuilder;
use termai::session::Session;

fn init_logging(verbose: bool) {
    let default_directive = if verbose { "termai=debug" } else { "termai=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn mock_enabled() -> bool {
    std::env::var(MOCK_ENV).map(|v| !v.is_empty() && v != "0").unwrap_or(false)
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("termai")
        .about("Terminal AI assistant - turns plain-language tasks into shell commands")
        .long_about(
            "termai asks a language model for the shell commands that accomplish a task, \
asks before running anything that looks dangerous, and runs the rest in your current directory.",
        )
        .arg(Arg::new("task")
            .help("Run a single task and exit instead of starting the interactive session")
            .num_args(1..))
        .arg(Arg::new("home")
            .long("home")
            .help("Data directory (default: $TERMAI_HOME or ~/.termai)")
            .value_name("DIR")
            .value_parser(clap::value_parser!(PathBuf)))
        .arg(Arg::new("set-api-key")
            .long("set-api-key")
            .help("Store the Gemini API key and exit")
            .value_name("API_KEY")
            .num_args(1))
        .arg(Arg::new("config")
            .long("config")
            .help("Show configuration information and exit")
            .action(ArgAction::SetTrue))
        .arg(Arg::new("verbose")
            .short('v')
            .long("verbose")
            .help("Log debug output to stderr")
            .action(ArgAction::SetTrue))
        .get_matches();

    init_logging(matches.get_flag("verbose"));

    let paths = Paths::resolve(matches.get_one::<PathBuf>("home").map(PathBuf::as_path))?;
    paths.ensure_root()?;
    let credentials = CredentialStore::new(paths.credentials_file());

    if let Some(api_key) = matches.get_one::<String>("set-api-key") {
        credentials.save(api_key)?;
        println!("API key saved successfully");
        return Ok(());
    }

    let config = Config::load(&paths.config_file())?;

    if matches.get_flag("config") {
        let has_api_key = credentials.resolve()?.is_some();
        Config::show_config_info(&paths, &config, has_api_key);
        return Ok(());
    }

    let mock = mock_enabled();
    let shell = ShellProcessRunner::detect_shell(config.shell.as_deref())?;
    info!("Using shell: {}", shell);

    let generator: Box<dyn CommandGenerator> = if mock {
        info!("Using mock generator");
        Box::new(MockGenerator::new())
    } else {
        let http = ReqwestHttpClient::new(config.request_timeout())?;
        Box::new(GeminiGenerator::new(Box::new(http), config.api_base_url.clone()))
    };

    let mut api_key = credentials.resolve()?;
    if api_key.is_none() && !mock {
        println!("No Gemini API key found.");
        println!("Get one at https://aistudio.google.com/app/apikey");
        let stdin = io::stdin();
        api_key = credentials.prompt_and_save_with_io(
            "Enter your Gemini API key now (or press Enter to quit): ",
            &mut stdin.lock(),
            &mut io::stdout(),
        )?;
        if api_key.is_none() {
            eprintln!("{}", StartupError::NoApiKey);
            std::process::exit(1);
        }
    }

    let history = HistoryLog::new(paths.history_file());
    history.ensure_exists()?;
    let denylist = Denylist::load_or_default(&paths.denylist_file());
    debug!("Denylist has {} pattern(s)", denylist.patterns().len());

    let runner = ShellProcessRunner::new(shell, config.command_timeout());
    let shell_name = Path::new(runner.shell())
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| runner.shell().to_string());
    let prompt_builder = PromptBuilder::detect(&shell_name);
    let executor = Executor::new(Box::new(runner), denylist, history);

    let cwd = std::env::current_dir()?;
    let session = Session::new(paths, config, api_key, cwd);
    let mut router = CommandRouter::new(session, generator, executor, prompt_builder);

    let task_args: Vec<String> = matches
        .get_many::<String>("task")
        .unwrap_or_default()
        .map(|s| s.to_string())
        .collect();

    if !task_args.is_empty() {
        let task = task_args.join(" ");
        info!("Running single task: {}", task);
        let stdin = io::stdin();
        router
            .handle_line_with_io(&task, &mut stdin.lock(), &mut io::stdout(), &mut io::stderr())
            .await?;
        return Ok(());
    }

    builtins::clear_screen(&mut io::stdout())?;
    router.run().await
}
