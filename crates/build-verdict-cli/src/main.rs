// crates/build-verdict-cli/src/main.rs
// ============================================================================
// Module: Build Verdict CLI Entry Point
// Description: Command dispatcher for the build verdict service and its data.
// Purpose: Serve verdicts, inspect branches, and maintain the record database.
// Dependencies: clap, build-verdict-core, build-verdict-server, thiserror, tokio.
// ============================================================================

//! ## Overview
//! The Build Verdict CLI runs the long-lived verdict service and provides
//! offline helpers over the same `SQLite` record database: registering
//! branches, appending build outcomes, and computing a branch verdict once.
//! All user-facing strings are routed through the i18n catalog.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use build_verdict_cli::i18n::Locale;
use build_verdict_cli::i18n::set_locale;
use build_verdict_cli::t;
use build_verdict_config::BuildVerdictConfig;
use build_verdict_core::BranchName;
use build_verdict_core::BranchVerdict;
use build_verdict_core::BuildOutcome;
use build_verdict_core::BuildStatus;
use build_verdict_core::RecordSource;
use build_verdict_core::derive_verdict;
use build_verdict_core::unix_millis_now;
use build_verdict_server::VerdictServer;
use build_verdict_store_sqlite::SqliteRecordSource;
use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable for CLI locale selection.
const LANG_ENV: &str = "BUILD_VERDICT_LANG";

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "build-verdict", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Preferred output language (overrides `BUILD_VERDICT_LANG`).
    #[arg(long, value_enum, value_name = "LANG", global = true)]
    lang: Option<LangArg>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the refresh loop and serve verdict queries over HTTP.
    Serve(ConfigArgs),
    /// Compute one branch verdict directly from the record database.
    Verdict(VerdictCommand),
    /// Branch registration utilities.
    Branch {
        /// Selected branch subcommand.
        #[command(subcommand)]
        command: BranchCommand,
    },
    /// Append a build outcome to the record database.
    Record(RecordCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Shared config path argument.
#[derive(Args, Debug)]
struct ConfigArgs {
    /// Optional config file path (defaults to build-verdict.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for the one-shot verdict command.
#[derive(Args, Debug)]
struct VerdictCommand {
    /// Config file selection.
    #[command(flatten)]
    config: ConfigArgs,
    /// Branch to evaluate.
    #[arg(long, value_name = "NAME")]
    branch: String,
    /// Print only `<Overall>/<User>` for this submitter.
    #[arg(long, value_name = "NAME")]
    user: Option<String>,
}

/// Branch subcommands.
#[derive(Subcommand, Debug)]
enum BranchCommand {
    /// Register a branch or update its monitored flag.
    Add(BranchAddCommand),
}

/// Arguments for `branch add`.
#[derive(Args, Debug)]
struct BranchAddCommand {
    /// Config file selection.
    #[command(flatten)]
    config: ConfigArgs,
    /// Branch name.
    #[arg(long, value_name = "NAME")]
    name: String,
    /// Register the branch without CI monitoring.
    #[arg(long, action = ArgAction::SetTrue)]
    unmonitored: bool,
}

/// Arguments for `record`.
#[derive(Args, Debug)]
struct RecordCommand {
    /// Config file selection.
    #[command(flatten)]
    config: ConfigArgs,
    /// Branch the changelist was submitted to.
    #[arg(long, value_name = "NAME")]
    branch: String,
    /// Changelist number.
    #[arg(long, value_name = "N")]
    changelist: i64,
    /// Submitter user name.
    #[arg(long, value_name = "USER")]
    submitter: String,
    /// Build status code (-1 good, 0 unknown, anything else bad).
    #[arg(long, value_name = "CODE", allow_hyphen_values = true)]
    status: i64,
    /// Record time in unix milliseconds (defaults to now).
    #[arg(long, value_name = "MS")]
    timestamp_ms: Option<i64>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a Build Verdict configuration file.
    Validate(ConfigArgs),
}

/// Supported CLI language selections.
#[derive(ValueEnum, Copy, Clone, Debug)]
enum LangArg {
    /// English.
    En,
    /// Catalan.
    Ca,
}

impl From<LangArg> for Locale {
    fn from(value: LangArg) -> Self {
        match value {
            LangArg::En => Self::En,
            LangArg::Ca => Self::Ca,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for localized error messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a localized message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    let env_lang = std::env::var(LANG_ENV).ok();
    let locale = resolve_locale(cli.lang, env_lang.as_deref())?;
    set_locale(locale);
    if locale != Locale::En {
        write_stderr_line(&t!("i18n.disclaimer.machine_translated"))
            .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    }

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&t!("main.version", version = version))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    match command {
        Commands::Serve(command) => command_serve(&command).await,
        Commands::Verdict(command) => command_verdict(&command),
        Commands::Branch {
            command,
        } => match command {
            BranchCommand::Add(command) => command_branch_add(&command),
        },
        Commands::Record(command) => command_record(&command),
        Commands::Config {
            command,
        } => match command {
            ConfigCommand::Validate(command) => command_config_validate(&command),
        },
    }
}

/// Prints top-level help.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: &ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(command)?;
    let server = VerdictServer::from_config(&config)
        .map_err(|err| CliError::new(t!("serve.init_failed", error = err)))?;
    write_stderr_line(&t!(
        "serve.starting",
        bind = config.server.bind,
        interval_ms = config.refresh.interval_ms
    ))
    .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    server
        .serve(shutdown_signal())
        .await
        .map_err(|err| CliError::new(t!("serve.failed", error = err)))?;
    write_stderr_line(&t!("serve.stopped"))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Resolves when the process receives Ctrl-C.
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

// ============================================================================
// SECTION: Data Commands
// ============================================================================

/// Executes the one-shot `verdict` command.
fn command_verdict(command: &VerdictCommand) -> CliResult<ExitCode> {
    let config = load_config(&command.config)?;
    let source = open_source(&config)?;
    let branch = parse_branch(&command.branch)?;
    let outcomes = source.outcomes(&branch).map_err(|err| {
        CliError::new(t!("verdict.read_failed", branch = branch, error = err))
    })?;
    let verdict = derive_verdict(&outcomes);
    for line in render_verdict(&branch, &verdict, command.user.as_deref()) {
        write_stdout_line(&line).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes `branch add`.
fn command_branch_add(command: &BranchAddCommand) -> CliResult<ExitCode> {
    let config = load_config(&command.config)?;
    let source = open_source(&config)?;
    let branch = parse_branch(&command.name)?;
    let monitored = !command.unmonitored;
    source.upsert_branch(&branch, monitored).map_err(|err| {
        CliError::new(t!("branch.add.failed", branch = branch, error = err))
    })?;
    write_stdout_line(&t!("branch.add.ok", branch = branch, monitored = monitored))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `record`.
fn command_record(command: &RecordCommand) -> CliResult<ExitCode> {
    let config = load_config(&command.config)?;
    let source = open_source(&config)?;
    let branch = parse_branch(&command.branch)?;
    let timestamp_ms = command.timestamp_ms.unwrap_or_else(unix_millis_now);
    let status = BuildStatus::from_code(command.status);
    let outcome =
        BuildOutcome::new(command.changelist, status, command.submitter.as_str(), timestamp_ms);
    source.insert_outcome(&branch, &outcome).map_err(|err| {
        CliError::new(t!(
            "record.failed",
            changelist = command.changelist,
            branch = branch,
            error = err
        ))
    })?;
    write_stdout_line(&t!(
        "record.ok",
        changelist = command.changelist,
        branch = branch,
        submitter = command.submitter,
        status = status
    ))
    .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the config validation command.
fn command_config_validate(command: &ConfigArgs) -> CliResult<ExitCode> {
    let _config = load_config(command)?;
    write_stdout_line(&t!("config.validate.ok"))
        .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads and validates configuration.
fn load_config(args: &ConfigArgs) -> CliResult<BuildVerdictConfig> {
    BuildVerdictConfig::load(args.config.as_deref())
        .map_err(|err| CliError::new(t!("config.load_failed", error = err)))
}

/// Opens the configured `SQLite` record database.
fn open_source(config: &BuildVerdictConfig) -> CliResult<SqliteRecordSource> {
    SqliteRecordSource::new(config.record_source.sqlite_config()).map_err(|err| {
        CliError::new(t!(
            "source.open_failed",
            path = config.record_source.path.display(),
            error = err
        ))
    })
}

/// Validates a branch name argument.
fn parse_branch(value: &str) -> CliResult<BranchName> {
    if value.trim().is_empty() {
        return Err(CliError::new(t!("branch.name.empty")));
    }
    Ok(BranchName::new(value))
}

/// Renders a verdict as output lines.
///
/// With a user, a single `<Overall>/<User>` line; otherwise the overall
/// verdict followed by one line per submitter.
fn render_verdict(
    branch: &BranchName,
    verdict: &BranchVerdict,
    user: Option<&str>,
) -> Vec<String> {
    if let Some(user) = user {
        return vec![format!("{}/{}", verdict.overall, verdict.user_state(user))];
    }
    let mut lines = vec![t!("verdict.overall", branch = branch, status = verdict.overall)];
    if verdict.per_user.is_empty() {
        lines.push(t!("verdict.no_records"));
    }
    for (user, status) in &verdict.per_user {
        lines.push(t!("verdict.user", user = user, status = status));
    }
    lines
}

/// Resolves the output locale from the flag, then the environment.
fn resolve_locale(lang: Option<LangArg>, env_lang: Option<&str>) -> CliResult<Locale> {
    if let Some(lang) = lang {
        return Ok(lang.into());
    }
    if let Some(value) = env_lang {
        return Locale::parse(value).ok_or_else(|| {
            CliError::new(t!("i18n.lang.invalid_env", env = LANG_ENV, value = value))
        });
    }
    Ok(Locale::En)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats a localized output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    let stream_label = match stream {
        "stdout" => t!("output.stream.stdout"),
        "stderr" => t!("output.stream.stderr"),
        _ => t!("output.stream.unknown"),
    };
    t!("output.write_failed", stream = stream_label, error = error)
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
