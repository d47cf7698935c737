//! CLI application for pickup order intake.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{check, config, ingest};

/// Pickup order intake - admit, store, and extract pickup order documents
#[derive(Parser)]
#[command(name = "pickup")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run local files through the intake pipeline
    Ingest(ingest::IngestArgs),

    /// Check that a file has the expected binary format
    Check(check::CheckArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Ingest(args) => ingest::run(args, cli.config.as_deref()).await,
        Commands::Check(args) => check::run(args),
        Commands::Config(args) => config::run(args, cli.config.as_deref()),
    }
}
