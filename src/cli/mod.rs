//! CLI module for the leaderboard browser
//!
//! One-shot page fetches, an interactive browsing shell, and config management.

mod commands;
mod output;
mod shell;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;

pub use output::{OutputFormat, print_error};

/// Leaderboard - browse ranked event standings page by page
#[derive(Parser, Debug)]
#[command(name = "leaderboard")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[command(flatten)]
    pub output: OutputOptions,

    /// Use this configuration file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output formatting options
#[derive(Parser, Debug, Clone)]
pub struct OutputOptions {
    /// Output in JSON format (for machine parsing)
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Increase output verbosity
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl OutputOptions {
    pub fn format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a single leaderboard page
    Fetch(commands::fetch::FetchArgs),

    /// Browse a leaderboard interactively
    Browse,

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: commands::config::ConfigCommands,
    },
}

/// Run the CLI with parsed arguments
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = cli.output.format();
    let quiet = cli.output.quiet;
    let config_path = Config::resolve_path(cli.config.as_deref())?;

    match cli.command {
        Commands::Fetch(args) => commands::fetch::run(args, &config_path, format).await,
        Commands::Browse => shell::run(&config_path, format, quiet).await,
        Commands::Config { command } => {
            commands::config::run(command, &config_path, format, quiet).await
        }
    }
}
