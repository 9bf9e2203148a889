//! Main entry point for the Hemolink CLI.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use shared::config::client::Config;

mod commands;
mod tracer;

use commands::{
    communities::CommunitiesArgs, config::ConfigArgs, mark_read::MarkReadArgs,
    unread::UnreadArgs, watch::WatchArgs,
};

/// Hemolink CLI
#[derive(Parser)]
#[command(name = "hemolink")]
#[command(about = "Command-line client for Hemolink community messaging", long_about = None)]
struct Cli {
    /// Path to a configuration file (YAML, JSON or TOML)
    #[arg(
        long,
        short,
        global = true,
        help = "Path to the configuration file (e.g., config.yaml). Defaults to the user config directory, then built-in defaults."
    )]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for the Hemolink CLI
#[derive(Subcommand)]
enum Commands {
    /// Show unread message counts per community
    Unread(UnreadArgs),

    /// Mark every message in a community as read
    MarkRead(MarkReadArgs),

    /// List the communities the signed-in user belongs to
    Communities(CommunitiesArgs),

    /// Follow unread counts until interrupted
    Watch(WatchArgs),

    /// Generate a configuration file
    Config(ConfigArgs),

    /// Generate shell completion scripts for the CLI
    Completion {
        /// The shell to generate the completion script for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = path.or_else(commands::default_config_path);
    let config = Config::load_config(path).context("failed to load configuration")?;
    tracer::initialize_tracing(&config);
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Unread(args) => {
            let config = load_config(cli.config)?;
            commands::unread::show_unread(&config, args).await?;
        }
        Commands::MarkRead(args) => {
            let config = load_config(cli.config)?;
            commands::mark_read::mark_read(&config, args).await?;
        }
        Commands::Communities(args) => {
            let config = load_config(cli.config)?;
            commands::communities::list_communities(&config, args).await?;
        }
        Commands::Watch(args) => {
            let config = load_config(cli.config)?;
            commands::watch::watch(&config, args).await?;
        }
        Commands::Config(args) => {
            commands::config::generate_config(&args)?;
        }
        Commands::Completion { shell } => {
            commands::completion::generate_completion(shell);
        }
    }

    Ok(())
}
