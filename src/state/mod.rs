//! Leaderboard browsing state
//!
//! Each submodule owns one concern: the request ledger, the dispatch guard
//! around it, the pagination rules, and the refresh debounce. `LeaderboardState`
//! ties them together and owns the in-flight fetch tasks.

mod dispatch;
mod leaderboard;
mod pagination;
mod refresh;
mod request;

pub use leaderboard::{LeaderboardOptions, LeaderboardState};
pub use pagination::sanitize_event_name;
pub use request::RequestStatus;

/// Events that state methods can return.
/// These communicate results back to the view without direct output.
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    /// Update the status line
    StatusMessage(String),

    /// Log an error message
    LogError(String),

    /// Log an info message
    LogInfo(String),
}
