mod api;
mod cli;
mod config;
mod state;
mod task;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    // Logs go to stderr so command output stays clean
    let default_filter = if cli.output.verbose {
        "leaderboard=debug,info"
    } else {
        "leaderboard=warn"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::debug!("Starting leaderboard v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = cli::run(cli).await {
        cli::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}
