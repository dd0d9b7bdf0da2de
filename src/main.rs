use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use stepreplay_cli::commands::{cmd_fingerprint, cmd_inspect, cmd_invalidate};
use stepreplay_cli::{init_logging, load_config, LogFormat};

/// stepreplay - snapshot-cached natural-language browser tests
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    debug: bool,

    /// Log output format
    #[arg(long, value_enum, default_value = "human")]
    log_format: LogFormat,

    /// Troubleshooting mode
    #[arg(long)]
    troubleshoot: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the snapshot key and per-step fingerprints of a test file
    Fingerprint {
        file: PathBuf,

        /// Stable test id used as snapshot key
        #[arg(long)]
        id: Option<String>,
    },

    /// Show whether the snapshot would be replayed and which steps are cached
    Inspect {
        file: PathBuf,

        #[arg(long)]
        id: Option<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Flag the snapshot so the next run regenerates every step
    Invalidate {
        file: PathBuf,

        #[arg(long)]
        id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.debug, cli.log_format)?;
    info!("Starting stepreplay v{}", env!("CARGO_PKG_VERSION"));

    let result = run(cli).await;

    match result {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref()).await?;
    config.troubleshoot |= cli.troubleshoot;

    match cli.command {
        Commands::Fingerprint { file, id } => cmd_fingerprint(&file, id.as_deref()).await,
        Commands::Inspect { file, id, json } => {
            cmd_inspect(&config, &file, id.as_deref(), json).await
        }
        Commands::Invalidate { file, id } => cmd_invalidate(&config, &file, id.as_deref()).await,
    }
}
