//! Operator CLI for the mining session engine
//!
//! Every command builds an agent over filesystem-backed tiers under the data
//! directory: `local/` holds the fast key-value tier and `remote/` stands in for the
//! document database.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{common::Context, reset, run, session, status};

#[derive(Parser)]
#[command(name = "miner")]
#[command(about = "Mining session timer with local and remote persistence", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = ".miner/config.toml")]
    config: PathBuf,

    /// Directory holding persisted state
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a mining session
    Start(session::SessionArgs),
    /// Stop the running session
    Stop(session::SessionArgs),
    /// Show balance and session progress
    Status(status::StatusArgs),
    /// Resume and drive the session in the foreground
    Run(run::RunArgs),
    /// Clear locally persisted state
    Reset(reset::ResetArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let ctx = Context::load(&cli.config, cli.data_dir)?;

    match cli.command {
        Commands::Start(args) => session::start(&ctx, args).await?,
        Commands::Stop(args) => session::stop(&ctx, args).await?,
        Commands::Status(args) => status::show(&ctx, args).await?,
        Commands::Run(args) => run::run(&ctx, args).await?,
        Commands::Reset(args) => reset::reset(&ctx, args)?,
    }

    Ok(())
}
