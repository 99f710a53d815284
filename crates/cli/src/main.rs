//! EDITH CLI
//!
//! Main entry point for the `edith` command-line tool: ingest notes into a
//! local index and ask questions grounded in them.

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    output, AnalyzeCommand, AskCommand, ChatCommand, ClassifyCommand, ClearCommand,
    DeleteCommand, IngestCommand, StatsCommand, SummarizeCommand,
};
use edith_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;
use std::process::ExitCode;

/// EDITH - a local-first assistant over your own notes
#[derive(Parser, Debug)]
#[command(name = "edith")]
#[command(about = "Ask questions grounded in your own notes", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "EDITH_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "EDITH_CONFIG")]
    config: Option<PathBuf>,

    /// Log level or filter (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Generation backend (ollama, openai, echo)
    #[arg(short, long, global = true, env = "EDITH_PROVIDER")]
    provider: Option<String>,

    /// Model identifier
    #[arg(short, long, global = true, env = "EDITH_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add files or folders to the index
    Ingest(IngestCommand),

    /// Ask a single question
    Ask(AskCommand),

    /// Interactive conversation
    Chat(ChatCommand),

    /// Summarize everything in the index
    Summarize(SummarizeCommand),

    /// Analyze one note
    Analyze(AnalyzeCommand),

    /// Show index and backend statistics
    Stats(StatsCommand),

    /// Remove one document from the index
    Delete(DeleteCommand),

    /// Remove every document from the index
    Clear(ClearCommand),

    /// Show how a message would be routed
    Classify(ClassifyCommand),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Self::Ingest(_) => "ingest",
            Self::Ask(_) => "ask",
            Self::Chat(_) => "chat",
            Self::Summarize(_) => "summarize",
            Self::Analyze(_) => "analyze",
            Self::Stats(_) => "stats",
            Self::Delete(_) => "delete",
            Self::Clear(_) => "clear",
            Self::Classify(_) => "classify",
        }
    }

    fn json(&self) -> bool {
        match self {
            Self::Ingest(cmd) => cmd.json,
            Self::Ask(cmd) => cmd.json,
            Self::Summarize(cmd) => cmd.json,
            Self::Analyze(cmd) => cmd.json,
            Self::Stats(cmd) => cmd.json,
            Self::Delete(cmd) => cmd.json,
            Self::Clear(cmd) => cmd.json,
            Self::Classify(cmd) => cmd.json,
            Self::Chat(_) => false,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let json = cli.command.json();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("Command failed: {}", err);
            output::print_error(&err, json);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> AppResult<()> {
    let mut config = AppConfig::load()?;

    // An explicit --config is merged on top of whatever load() found
    if let Some(ref path) = cli.config {
        config.merge_yaml(path)?;
    }

    let config = config.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color, cli.log_json)?;

    tracing::info!("EDITH starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {}", config.llm.provider);
    tracing::debug!("Model: {}", config.llm.model);

    config.validate()?;
    config.ensure_edith_dir()?;

    let _span = tracing::info_span!("command", name = cli.command.name()).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Chat(cmd) => cmd.execute(&config).await,
        Commands::Summarize(cmd) => cmd.execute(&config).await,
        Commands::Analyze(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
        Commands::Delete(cmd) => cmd.execute(&config).await,
        Commands::Clear(cmd) => cmd.execute(&config).await,
        Commands::Classify(cmd) => cmd.execute(),
    };

    if result.is_ok() {
        tracing::info!("Command completed successfully");
    }

    result
}
