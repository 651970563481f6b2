//! codeloom CLI — the main entry point.
//!
//! Commands:
//! - `init`     — Write a default config and create the workspace
//! - `chat`     — Run one prompt through the agent engine
//! - `sessions` — List stored sessions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "codeloom",
    about = "codeloom — an AI coding assistant engine",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "codeloom.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config and create the workspace directories
    Init,

    /// Send a prompt to the agent and stream the result
    Chat {
        /// The prompt to run
        prompt: String,

        /// Continue an existing session instead of creating one
        #[arg(short, long)]
        session: Option<String>,

        /// Approve the plan immediately instead of waiting for the timeout
        #[arg(short = 'y', long)]
        approve: bool,
    },

    /// List stored sessions
    Sessions,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init => commands::init::run(&cli.config).await?,
        Commands::Chat {
            prompt,
            session,
            approve,
        } => commands::chat::run(&cli.config, &prompt, session, approve).await?,
        Commands::Sessions => commands::sessions::run(&cli.config).await?,
    }

    Ok(())
}
