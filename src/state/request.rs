//! Async request state machine
//!
//! A ledger of the last fetch outcome: `Idle -> Pending -> Resolved | Rejected`,
//! re-entering `Pending` on every new fetch. It performs no I/O and has no
//! opinion on retries.

use serde::Serialize;

/// Lifecycle of the most recent request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Idle,
    Pending,
    Resolved,
    Rejected,
}

/// A state change requested by the owner of an `AsyncState`
#[derive(Debug, Clone, PartialEq)]
pub enum Transition<D, E> {
    Start,
    Resolve(D),
    Reject(E),
    Reset,
}

/// Status plus the latest data or error.
///
/// `data()` is only ever `Some` while `Resolved` and `error()` only while
/// `Rejected`. Data from the last resolve is retained across `start()` so a view
/// can keep showing it via `stale_data()` while the next request is pending.
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncState<D, E> {
    status: RequestStatus,
    data: Option<D>,
    error: Option<E>,
}

impl<D, E> Default for AsyncState<D, E> {
    fn default() -> Self {
        Self {
            status: RequestStatus::Idle,
            data: None,
            error: None,
        }
    }
}

impl<D, E> AsyncState<D, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn data(&self) -> Option<&D> {
        match self.status {
            RequestStatus::Resolved => self.data.as_ref(),
            _ => None,
        }
    }

    /// Data from the previous resolve, readable while a new request is pending
    pub fn stale_data(&self) -> Option<&D> {
        match self.status {
            RequestStatus::Pending => self.data.as_ref(),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self.status {
            RequestStatus::Rejected => self.error.as_ref(),
            _ => None,
        }
    }

    pub fn start(&mut self) {
        self.status = RequestStatus::Pending;
        self.error = None;
    }

    pub fn resolve(&mut self, data: D) {
        self.status = RequestStatus::Resolved;
        self.data = Some(data);
        self.error = None;
    }

    pub fn reject(&mut self, error: E) {
        self.status = RequestStatus::Rejected;
        self.data = None;
        self.error = Some(error);
    }

    pub fn reset(&mut self) {
        self.status = RequestStatus::Idle;
        self.data = None;
        self.error = None;
    }

    pub fn apply(&mut self, transition: Transition<D, E>) {
        match transition {
            Transition::Start => self.start(),
            Transition::Resolve(data) => self.resolve(data),
            Transition::Reject(error) => self.reject(error),
            Transition::Reset => self.reset(),
        }
    }
}
