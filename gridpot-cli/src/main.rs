mod commands;
mod config;

use clap::{Parser, Subcommand};
use gridpot_core::{PoolError, PoolManager};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "gridpot")]
#[command(about = "GRIDPOT - squares betting pools")]
#[command(version)]
struct Cli {
    /// Data directory for pool storage
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pool lifecycle commands
    #[command(subcommand)]
    Pool(commands::PoolCommands),

    /// Square claim/release commands
    #[command(subcommand)]
    Square(commands::SquareCommands),

    /// Score entry and winner commands
    #[command(subcommand)]
    Score(commands::ScoreCommands),

    /// Ledger and balance commands
    #[command(subcommand)]
    Ledger(commands::LedgerCommands),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "gridpot={}",
            log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Get data directory
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| config::CliConfig::default().data_dir);

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir).await?;

    // Initialize pool manager
    let manager = PoolManager::new(&data_dir).await?;

    // Execute command
    let result = match cli.command {
        Commands::Pool(cmd) => commands::handle_pool_command(cmd, &manager).await,
        Commands::Square(cmd) => commands::handle_square_command(cmd, &manager).await,
        Commands::Score(cmd) => commands::handle_score_command(cmd, &manager).await,
        Commands::Ledger(cmd) => commands::handle_ledger_command(cmd, &manager).await,
    };

    if let Err(e) = result {
        match e {
            PoolError::PoolNotFound(id) => {
                eprintln!("Error: Pool '{}' not found", id);
                eprintln!("Use 'gridpot pool list' to see available pools");
            }
            PoolError::SquareUnavailable { row, col } => {
                eprintln!("Error: Square ({},{}) is taken", row, col);
            }
            PoolError::CapacityExceeded { limit } => {
                eprintln!("Error: Player already holds the maximum of {} squares", limit);
            }
            PoolError::AlreadyLocked => {
                eprintln!("Error: Pool is already locked; digits cannot be regenerated");
            }
            PoolError::PoolLocked => {
                eprintln!("Error: Pool is locked; squares can no longer be released");
            }
            _ => {
                eprintln!("Error: {}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
