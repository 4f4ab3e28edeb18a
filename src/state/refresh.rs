//! Timed lock that debounces manual refreshes

use std::time::Duration;

use tokio::time::Instant;

pub const DEFAULT_REFRESH_WINDOW: Duration = Duration::from_millis(500);

/// Engaged on refresh, released automatically once the window passes,
/// whether or not the refresh fetch has finished.
#[derive(Debug, Clone)]
pub struct RefreshGuard {
    window: Duration,
    locked_until: Option<Instant>,
}

impl Default for RefreshGuard {
    fn default() -> Self {
        Self::new(DEFAULT_REFRESH_WINDOW)
    }
}

impl RefreshGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            locked_until: None,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked_until.is_some_and(|until| Instant::now() < until)
    }

    /// Engage the lock if it is open. Returns false (and does nothing) while locked.
    pub fn try_engage(&mut self) -> bool {
        if self.is_locked() {
            return false;
        }
        self.locked_until = Some(Instant::now() + self.window);
        true
    }
}
