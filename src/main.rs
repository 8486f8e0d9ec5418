use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use butterfly::config::{self, Config, Credentials};
use butterfly::console;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "butterfly=info";

/// butterfly - suggests answers to webinar audience questions from a reference document
#[derive(Parser)]
#[command(name = "butterfly")]
#[command(about = "Suggests answers to live webinar questions from a reference document")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Poll the webinar for questions and print suggested answers
    Watch(WatchCommand),
    /// Answer a single question against the document
    Ask(AskCommand),
    /// Open the interactive question dashboard
    Dashboard(DashboardCommand),
    /// Save Livestorm credentials to a .env file
    Connect(ConnectCommand),
}

/// Watch the webinar from the console
#[derive(Parser)]
struct WatchCommand {
    /// Reference document (PDF) used to answer questions
    #[arg(value_name = "PDF")]
    pdf: PathBuf,
}

/// Ask one question
#[derive(Parser)]
struct AskCommand {
    /// Reference document (PDF) used to answer the question
    #[arg(value_name = "PDF")]
    pdf: PathBuf,

    /// The question to answer
    #[arg(value_name = "QUESTION")]
    question: String,
}

/// Open the dashboard
#[derive(Parser)]
struct DashboardCommand {
    /// Reference document (PDF) used to answer questions
    #[arg(value_name = "PDF")]
    pdf: PathBuf,
}

/// Persist credentials
#[derive(Parser)]
struct ConnectCommand {
    /// Livestorm API token
    #[arg(long, value_name = "TOKEN")]
    token: String,

    /// Livestorm webinar session id
    #[arg(long, value_name = "SESSION_ID")]
    session_id: String,

    /// File to write the credentials to
    #[arg(long, value_name = "PATH", default_value = ".env")]
    env_file: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Watch(cmd) => handle_watch(cmd),
        Commands::Ask(cmd) => handle_ask(cmd),
        Commands::Dashboard(cmd) => handle_dashboard(cmd),
        Commands::Connect(cmd) => handle_connect(cmd),
    };

    if let Err(e) = result {
        // Determine exit code based on error type
        let exit_code = if is_user_error(&e) { 1 } else { 2 };
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code);
    }
}

/// Determines if an error is a user error (vs internal error).
///
/// User errors are missing or invalid configuration and bad arguments.
/// Internal errors include network and I/O failures.
fn is_user_error(error: &anyhow::Error) -> bool {
    let error_msg = error.to_string();
    error_msg.contains("not set in environment")
        || error_msg.contains("cannot be empty")
        || error_msg.contains("must be")
        || error_msg.contains("Document not found")
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Sends logs to stderr so they interleave with console output.
fn init_stderr_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(io::stderr)
        .try_init();
}

/// Sends logs to a file so they do not draw over the dashboard.
///
/// Returns the log file path as `{cache_dir}/butterfly/butterfly.log`.
fn init_file_logging() -> Result<PathBuf> {
    let log_path = get_log_path()?;
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
    Ok(log_path)
}

/// Gets the cross-platform log file path.
fn get_log_path() -> Result<PathBuf> {
    let cache_dir =
        dirs::cache_dir().ok_or_else(|| anyhow::anyhow!("Failed to determine cache directory"))?;

    Ok(cache_dir.join("butterfly").join("butterfly.log"))
}

/// Fails early when the document does not exist.
fn ensure_document(path: &Path) -> Result<()> {
    if !path.is_file() {
        anyhow::bail!("Document not found: {}", path.display());
    }
    Ok(())
}

/// Handles the watch command by polling and printing answers until interrupted.
fn handle_watch(cmd: &WatchCommand) -> Result<()> {
    init_stderr_logging();
    ensure_document(&cmd.pdf)?;

    let config = Config::from_env()?;
    let engine = config.answer_engine()?;
    let mut poller = config.poller_builder()?.build();

    println!(
        "Watching for questions every {}s (Ctrl+C to quit)",
        config.poll_interval.as_secs()
    );
    let mut stdout = io::stdout();
    console::watch(&mut poller, &engine, &cmd.pdf, &mut stdout).context("Polling stopped")
}

/// Handles the ask command by answering one question.
fn handle_ask(cmd: &AskCommand) -> Result<()> {
    init_stderr_logging();
    if cmd.question.trim().is_empty() {
        anyhow::bail!("Question cannot be empty");
    }
    ensure_document(&cmd.pdf)?;

    let config = Config::from_env()?;
    let engine = config.answer_engine()?;
    let answer = engine
        .answer_question(&cmd.pdf, &cmd.question)
        .context("Failed to answer question")?;

    println!("{answer}");
    Ok(())
}

/// Handles the dashboard command.
fn handle_dashboard(cmd: &DashboardCommand) -> Result<()> {
    let log_path = init_file_logging()?;
    ensure_document(&cmd.pdf)?;

    let config = Config::from_env()?;
    let engine = Arc::new(config.answer_engine()?);
    let builder = config.poller_builder()?;
    tracing::info!(log = %log_path.display(), "dashboard starting");

    butterfly::tui::run(builder, config.stop_on_poll_error, engine, &cmd.pdf)
}

/// Handles the connect command by writing credentials to the env file.
fn handle_connect(cmd: &ConnectCommand) -> Result<()> {
    let existing_key = existing_mistral_key(&cmd.env_file);
    execute_connect(cmd, existing_key)?;
    println!("Credentials saved to {}", cmd.env_file.display());
    Ok(())
}

/// Finds a Mistral key to carry over: the env file's own value first, then
/// the process environment.
fn existing_mistral_key(env_file: &Path) -> Option<String> {
    let from_file = dotenvy::from_path_iter(env_file).ok().and_then(|iter| {
        iter.filter_map(|item| item.ok())
            .find(|(key, _)| key == config::MISTRAL_API_KEY)
            .map(|(_, value)| value)
    });
    from_file.or_else(|| std::env::var(config::MISTRAL_API_KEY).ok())
}

/// Executes the connect command logic with a known Mistral key.
///
/// This function is separated from `handle_connect` to allow testing without
/// touching the process environment.
fn execute_connect(cmd: &ConnectCommand, mistral_api_key: Option<String>) -> Result<()> {
    config::save_credentials(
        &cmd.env_file,
        &Credentials {
            mistral_api_key,
            livestorm_api_token: cmd.token.trim().to_string(),
            livestorm_session_id: cmd.session_id.trim().to_string(),
        },
    )
}
