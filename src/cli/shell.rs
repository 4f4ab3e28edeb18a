//! Interactive browsing shell
//!
//! Binds line commands (event, range, next, prev, sort, refresh) to a
//! `LeaderboardState` and prints the view after every command.

use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Editor, Helper};
use serde::Serialize;

use crate::api::{LeaderboardClient, LeaderboardEntry, PageSource, Range, SortOrder};
use crate::cli::output::{OutputFormat, format_table, print_error, print_formatted, print_success};
use crate::config::Config;
use crate::state::{LeaderboardState, RequestStatus, StateEvent};

/// Commands and their argument completions
const COMMANDS: &[(&str, &[&str])] = &[
    ("event", &[]),
    ("range", &["global", "top100"]),
    ("next", &[]),
    ("prev", &[]),
    ("sort", &[]),
    ("refresh", &[]),
    ("show", &[]),
    ("help", &[]),
    ("exit", &[]),
    ("quit", &[]),
];

struct ShellCompleter;

fn pairs<'a>(words: impl Iterator<Item = &'a str>, prefix: &str) -> Vec<Pair> {
    words
        .filter(|word| word.starts_with(prefix))
        .map(|word| Pair {
            display: word.to_string(),
            replacement: word.to_string(),
        })
        .collect()
}

impl Completer for ShellCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        let start = line.rfind(' ').map(|i| i + 1).unwrap_or(0);
        let prefix = &line[start..];
        let words: Vec<&str> = line.split_whitespace().collect();

        // Still typing the command itself
        if start == 0 || words.is_empty() {
            return Ok((start, pairs(COMMANDS.iter().map(|(cmd, _)| *cmd), prefix)));
        }

        let completing_first_arg = words.len() == 1 || (words.len() == 2 && !prefix.is_empty());
        if !completing_first_arg {
            return Ok((pos, vec![]));
        }

        let candidates = COMMANDS
            .iter()
            .find(|(cmd, _)| *cmd == words[0])
            .map(|(_, args)| pairs(args.iter().copied(), prefix))
            .unwrap_or_default();
        Ok((start, candidates))
    }
}

impl Hinter for ShellCompleter {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        None
    }
}

impl Highlighter for ShellCompleter {}
impl Validator for ShellCompleter {}
impl Helper for ShellCompleter {}

/// One line typed at the prompt
#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_help_subcommand = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand, Debug, PartialEq)]
enum ShellCommand {
    /// Set the event name; with no argument, clear it
    Event { name: Vec<String> },
    /// Choose the leaderboard range
    Range { range: Range },
    /// Go to the next page
    Next,
    /// Go to the previous page
    Prev,
    /// Flip the rank ordering
    Sort,
    /// Reload the first page
    Refresh,
    /// Print the current view
    Show,
}

/// Everything the view shows, in one serializable snapshot
#[derive(Serialize)]
struct ViewSnapshot {
    status: RequestStatus,
    event_name: String,
    range: Option<Range>,
    sort_order: SortOrder,
    cursor: Option<u32>,
    back_page: Option<u32>,
    entries: Vec<LeaderboardEntry>,
    stale: bool,
    error: Option<String>,
    next_enabled: bool,
    previous_enabled: bool,
    refreshing: bool,
    in_flight: usize,
    fetched_at: Option<String>,
}

impl ViewSnapshot {
    fn capture<S: PageSource>(state: &LeaderboardState<S>) -> Self {
        let pagination = state.pagination();
        let (entries, stale) = match (state.data(), state.stale_data()) {
            (Some(page), _) => (page.entities.clone(), false),
            (None, Some(page)) => (page.entities.clone(), true),
            (None, None) => (Vec::new(), false),
        };

        Self {
            status: state.status(),
            event_name: pagination.event_name().to_string(),
            range: pagination.range(),
            sort_order: pagination.sort_order(),
            cursor: state.cursor(),
            back_page: pagination.back_page(),
            entries,
            stale,
            error: state.error().map(|e| e.to_string()),
            next_enabled: state.can_go_next(),
            previous_enabled: state.can_go_previous(),
            refreshing: state.is_refreshing(),
            in_flight: state.in_flight(),
            fetched_at: state.fetched_at().map(|t| t.format("%H:%M:%S").to_string()),
        }
    }

    fn render(&self) -> String {
        let range = self.range.map(|r| r.label()).unwrap_or("-");
        let event = if self.event_name.is_empty() {
            "-"
        } else {
            self.event_name.as_str()
        };
        let mut out = format!("Event: {} | {} | Rank: {}\n\n", event, range, self.sort_order);

        match self.status {
            RequestStatus::Idle => out.push_str("Please enter event name and range"),
            RequestStatus::Rejected => {
                out.push_str(self.error.as_deref().unwrap_or("Request failed"))
            }
            RequestStatus::Pending | RequestStatus::Resolved => {
                out.push_str(&format_table(&self.entries));
                if self.status == RequestStatus::Pending {
                    out.push_str(&format!("\n\nLoading... ({} in flight)", self.in_flight));
                }
                out.push_str(&format!(
                    "\n\n[{}] [{}] [{}]",
                    if self.previous_enabled { "< prev" } else { "  -   " },
                    if self.next_enabled { "next >" } else { "  -   " },
                    if self.refreshing { "Refreshing" } else { "Refresh Leaderboard" }
                ));
                if let Some(at) = &self.fetched_at {
                    out.push_str(&format!("\nUpdated {}", at));
                }
            }
        }
        out
    }
}

/// Apply one parsed command to the state and wait for its fetch to land
async fn apply_command<S: PageSource>(
    state: &mut LeaderboardState<S>,
    command: ShellCommand,
) -> Vec<StateEvent> {
    let event = match command {
        ShellCommand::Event { name } => state.set_event_name(&name.concat()),
        ShellCommand::Range { range } => state.set_range(range),
        ShellCommand::Next => {
            if !state.can_go_next() {
                return vec![StateEvent::StatusMessage("No next page".to_string())];
            }
            state.next()
        }
        ShellCommand::Prev => {
            if !state.can_go_previous() {
                return vec![StateEvent::StatusMessage("No previous page".to_string())];
            }
            state.previous()
        }
        ShellCommand::Sort => state.toggle_sort(),
        ShellCommand::Refresh => {
            if !state.can_refresh() {
                return vec![StateEvent::StatusMessage(
                    "Refresh is not available right now".to_string(),
                )];
            }
            state.refresh()
        }
        // Print whatever has landed without waiting on anything still in flight
        ShellCommand::Show => return state.poll(),
    };

    let mut events: Vec<StateEvent> = event.into_iter().collect();
    events.extend(state.settle().await);
    events
}

fn handle_events(events: Vec<StateEvent>, quiet: bool) {
    for event in events {
        match event {
            StateEvent::StatusMessage(msg) => print_success(&msg, quiet),
            StateEvent::LogInfo(msg) => tracing::info!("{}", msg),
            StateEvent::LogError(msg) => tracing::error!("{}", msg),
        }
    }
}

/// Run a single line. Returns Ok(true) to continue, Ok(false) to exit.
async fn run_line<S: PageSource>(
    state: &mut LeaderboardState<S>,
    line: &str,
    format: OutputFormat,
    quiet: bool,
) -> Result<bool> {
    match line {
        "help" => {
            print_help();
            return Ok(true);
        }
        "exit" | "quit" => return Ok(false),
        _ => {}
    }

    let parsed = match ShellLine::try_parse_from(line.split_whitespace()) {
        Ok(parsed) => parsed,
        Err(e) => {
            println!("{}", e);
            return Ok(true);
        }
    };

    let events = apply_command(state, parsed.command).await;
    handle_events(events, quiet);

    let snapshot = ViewSnapshot::capture(state);
    print_formatted(&snapshot, format, ViewSnapshot::render);
    Ok(true)
}

fn print_help() {
    println!(
        r#"Leaderboard Browser

Commands:
  event <name>             Set the event name (letters only)
  event                    Clear the event name
  range <global|top100>    Choose the leaderboard range
  next                     Go to the next page
  prev                     Go to the previous page
  sort                     Flip rank ordering (restarts at page 1)
  refresh                  Reload the first page, best ranks first
  show                     Print the current view

  help                     Show this help
  exit, quit               Exit the shell
"#
    );
}

/// Get the history file path
fn history_path() -> Option<std::path::PathBuf> {
    directories::ProjectDirs::from("com", "leaderboard", "Leaderboard")
        .map(|dirs| dirs.data_dir().join("browse_history"))
}

/// Run the interactive shell
pub async fn run(config_path: &Path, format: OutputFormat, quiet: bool) -> Result<()> {
    let config = Config::load(config_path)?;
    let client = LeaderboardClient::new(&config.api.base_url)?;

    let mut state = LeaderboardState::new(client, config.leaderboard_options());
    state.attach();

    if !quiet {
        println!("Leaderboard Browser v{}", env!("CARGO_PKG_VERSION"));
        println!("Connected to {}", config.api.base_url);
        println!("Type 'help' for available commands, 'exit' to quit.\n");
    }

    let editor_config = rustyline::Config::builder()
        .history_ignore_space(true)
        .completion_type(rustyline::CompletionType::List)
        .build();

    let mut rl = Editor::with_config(editor_config)?;
    rl.set_helper(Some(ShellCompleter));

    if let Some(path) = history_path() {
        let _ = rl.load_history(&path);
    }

    loop {
        match rl.readline("leaderboard> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line)?;

                match run_line(&mut state, line, format, quiet).await {
                    Ok(true) => continue,
                    Ok(false) => break,
                    Err(e) => print_error(&e.to_string()),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("exit");
                break;
            }
            Err(err) => {
                print_error(&format!("{:?}", err));
                break;
            }
        }
    }

    state.detach();

    if let Some(path) = history_path() {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = rl.save_history(&path);
    }

    Ok(())
}
