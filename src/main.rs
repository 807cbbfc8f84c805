//! Searchlog - help-center search logging and statistics
//!
//! Searchlog records every search typed into a help center, coalesces each
//! client's keystrokes into finished searches and keeps per-term statistics
//! about what people look for and how often nothing matches.

use clap::{Parser, Subcommand};
use searchlog_cli::{
    execute_command, exit_code_for_error, MigrateCommand, OutputFormat, OutputFormatter,
    ResetCommand, ServeCommand, StatsCommand, WorkCommand,
};
use searchlog_core::{logging, Result, SearchlogConfig};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "searchlog")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Searchlog - help-center search logging and statistics")]
#[command(long_about = r#"
Searchlog logs the searches typed into a help center and turns them into
per-term statistics.

A background worker groups each client's keystrokes into finished searches,
so "h", "ho", "how" typed in quick succession counts once as "how", while a
pause or an explicit submission counts as its own search.

Configuration is read from an optional YAML or JSON file and SEARCHLOG__*
environment variables, e.g. SEARCHLOG__DATABASE__URL.
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve(ServeCommand),

    /// Fold pending search events into statistics
    Work(WorkCommand),

    /// Show search statistics
    Stats(StatsCommand),

    /// Delete all search statistics
    Reset(ResetCommand),

    /// Apply database migrations
    Migrate(MigrateCommand),

    /// Validate the configuration and print it
    Validate,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!(category = %e.category(), "{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(exit_code_for_error(&e));
    }
}

async fn run(cli: Cli) -> Result<()> {
    searchlog_cli::init()?;

    let mut config = SearchlogConfig::load(cli.config.as_deref())?;
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    logging::init_logging_with_config(&config.logging)?;

    info!("Starting {}", searchlog_core::version_info());

    match cli.command {
        Commands::Serve(command) => execute_command(command, &config).await,
        Commands::Work(command) => execute_command(command, &config).await,
        Commands::Stats(command) => execute_command(command, &config).await,
        Commands::Reset(command) => execute_command(command, &config).await,
        Commands::Migrate(command) => execute_command(command, &config).await,
        Commands::Validate => OutputFormatter::new(OutputFormat::Yaml).output(&config),
    }
}
