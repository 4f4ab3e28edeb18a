//! Task polling utilities
//!
//! Non-blocking checks on fetch tasks spawned on the tokio runtime, so the
//! leaderboard state can apply finished results without awaiting them.

use futures::FutureExt;
use tokio::task::JoinHandle;

/// Result of polling a task
pub enum PollResult<T> {
    /// No task to poll (already taken)
    NoTask,
    /// Task is still running
    Pending,
    /// Task completed with result (may be Ok or join error)
    Complete(Result<T, tokio::task::JoinError>),
}

/// Poll an optional task handle and take its result if finished.
///
/// The handle is left in place while the task runs and removed once it
/// completes, so a second poll returns `NoTask`.
pub fn poll_task<T>(task: &mut Option<JoinHandle<T>>) -> PollResult<T> {
    match task {
        None => return PollResult::NoTask,
        Some(handle) if !handle.is_finished() => return PollResult::Pending,
        Some(_) => {}
    }

    let Some(mut handle) = task.take() else {
        return PollResult::NoTask;
    };
    // A finished task can still report Pending once the coop budget runs out
    match (&mut handle).now_or_never() {
        Some(result) => PollResult::Complete(result),
        None => {
            tracing::debug!("Finished task not ready yet, keeping handle");
            *task = Some(handle);
            PollResult::Pending
        }
    }
}
