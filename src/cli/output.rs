//! Output formatting utilities for CLI

use serde::Serialize;

use crate::api::LeaderboardEntry;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Print a serializable value as JSON or use custom text formatter
pub fn print_formatted<T, F>(value: &T, format: OutputFormat, text_formatter: F)
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Text => println!("{}", text_formatter(value)),
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(value) {
                println!("{}", json);
            }
        }
    }
}

/// Print a success message (suppressed in quiet mode)
pub fn print_success(message: &str, quiet: bool) {
    if !quiet {
        println!("{}", message);
    }
}

/// Print an error message (never suppressed)
pub fn print_error(message: &str) {
    eprintln!("Error: {}", message);
}

/// Render leaderboard rows as a fixed-width table
pub fn format_table(entries: &[LeaderboardEntry]) -> String {
    if entries.is_empty() {
        return "No entries".to_string();
    }

    let name_width = entries
        .iter()
        .map(|e| e.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("NAME".len());

    let mut lines = vec![format!(
        "{:>5}  {:<name_width$}  {:<24}  {:>10}",
        "RANK", "NAME", "AVATAR", "SCORE"
    )];
    for entry in entries {
        lines.push(format!(
            "{:>5}  {:<name_width$}  {:<24}  {:>10}",
            entry.rank,
            entry.name,
            entry.avatar_path().unwrap_or_else(|| "-".to_string()),
            entry.score
        ));
    }
    lines.join("\n")
}
