//! One-shot page fetch

use std::path::Path;

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use crate::api::{LeaderboardClient, LeaderboardEntry, PageRequest, Range, SortOrder};
use crate::cli::output::{OutputFormat, format_table, print_formatted};
use crate::config::Config;
use crate::state::sanitize_event_name;

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Event name (letters only; other characters are dropped)
    #[arg(long)]
    pub event: String,

    /// Leaderboard range: global or top100
    #[arg(long)]
    pub range: Range,

    /// Page number, starting at 1
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    pub page: u32,

    /// Rank ordering: asc or desc
    #[arg(long, default_value = "desc")]
    pub sort: SortOrder,

    /// Entries per page (defaults to api.page_size)
    #[arg(long)]
    pub size: Option<u32>,
}

#[derive(Serialize)]
struct FetchResult {
    request: PageRequest,
    entries: Vec<LeaderboardEntry>,
    next_page: Option<u32>,
}

pub async fn run(args: FetchArgs, config_path: &Path, format: OutputFormat) -> Result<()> {
    let config = Config::load(config_path)?;

    let event_name = sanitize_event_name(&args.event);
    if event_name.is_empty() {
        anyhow::bail!("Event name must contain at least one letter");
    }

    let request = PageRequest {
        event_name,
        range: args.range,
        page: args.page,
        size: args.size.unwrap_or(config.api.page_size),
        sort_order: args.sort,
    };

    let client = LeaderboardClient::new(&config.api.base_url)?;
    tracing::debug!("Fetching from {}", client.base_url());
    let page = client.get_page(&request).await?;

    let result = FetchResult {
        request,
        entries: page.entities,
        next_page: page.next_page.filter(|&next| next > 1),
    };

    print_formatted(&result, format, |r| {
        let mut out = format!(
            "{} - {} (page {}, {})\n\n{}",
            r.request.event_name,
            r.request.range.label(),
            r.request.page,
            r.request.sort_order,
            format_table(&r.entries)
        );
        match r.next_page {
            Some(next) => out.push_str(&format!("\n\nNext page: {}", next)),
            None => out.push_str("\n\nLast page"),
        }
        out
    });

    Ok(())
}
