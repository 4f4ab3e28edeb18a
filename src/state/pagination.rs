//! Pagination controller
//!
//! Turns user intent (query edits, next, previous, sort toggle, refresh) into
//! concrete `PageRequest`s. The server only reports the page that comes *next*,
//! so the page behind the current one is either recomputed from that cursor
//! (`cursor - 2`) or taken from a single remembered back page.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::api::{PageRequest, Range, SortOrder};

static NON_LETTERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("[^A-Za-z]").expect("static pattern")
});

/// Strip every character that is not an ASCII letter
pub fn sanitize_event_name(raw: &str) -> String {
    NON_LETTERS.replace_all(raw, "").into_owned()
}

/// Next is available while the cursor points past page 1
pub fn next_enabled(cursor: Option<u32>) -> bool {
    cursor.is_some_and(|c| c > 1)
}

/// Previous is available once the cursor is beyond page 2 (page 1 is the floor)
pub fn previous_enabled(cursor: Option<u32>) -> bool {
    cursor.is_some_and(|c| c > 2)
}

/// The leaderboard currently being browsed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryKey {
    pub event_name: String,
    pub range: Range,
}

/// Outcome of editing the query key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyChange {
    /// Key is complete; fetch the first page
    Fetch(PageRequest),
    /// Event name was cleared while a range is chosen; drop what is shown
    Clear,
    /// Nothing to do yet (no change, or the key is still being filled in)
    Wait,
}

#[derive(Debug, Clone)]
pub struct Pagination {
    event_name: String,
    range: Option<Range>,
    sort_order: SortOrder,
    back_page: Option<u32>,
    page_size: u32,
}

impl Pagination {
    pub fn new(page_size: u32) -> Self {
        Self {
            event_name: String::new(),
            range: None,
            sort_order: SortOrder::default(),
            back_page: None,
            page_size,
        }
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn range(&self) -> Option<Range> {
        self.range
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    pub fn back_page(&self) -> Option<u32> {
        self.back_page
    }

    pub fn query_key(&self) -> Option<QueryKey> {
        let range = self.range?;
        if self.event_name.is_empty() {
            return None;
        }
        Some(QueryKey {
            event_name: self.event_name.clone(),
            range,
        })
    }

    pub fn is_complete(&self) -> bool {
        self.query_key().is_some()
    }

    fn request(&self, page: u32, sort_order: SortOrder) -> Option<PageRequest> {
        let key = self.query_key()?;
        Some(PageRequest {
            event_name: key.event_name,
            range: key.range,
            page,
            size: self.page_size,
            sort_order,
        })
    }

    pub fn set_event_name(&mut self, raw: &str) -> KeyChange {
        let sanitized = sanitize_event_name(raw);
        if sanitized == self.event_name {
            return KeyChange::Wait;
        }
        self.event_name = sanitized;
        self.key_changed()
    }

    pub fn set_range(&mut self, range: Range) -> KeyChange {
        if self.range == Some(range) {
            return KeyChange::Wait;
        }
        self.range = Some(range);
        self.key_changed()
    }

    fn key_changed(&mut self) -> KeyChange {
        self.back_page = None;
        if self.event_name.is_empty() && self.range.is_some() {
            return KeyChange::Clear;
        }
        match self.request(1, self.sort_order) {
            Some(request) => KeyChange::Fetch(request),
            None => KeyChange::Wait,
        }
    }

    pub fn can_go_next(&self, cursor: Option<u32>) -> bool {
        self.is_complete() && next_enabled(cursor)
    }

    pub fn can_go_previous(&self, cursor: Option<u32>) -> bool {
        self.is_complete() && previous_enabled(cursor)
    }

    /// Request the page the cursor points at, remembering the one we leave
    pub fn next(&mut self, cursor: Option<u32>) -> Option<PageRequest> {
        let cursor = cursor.filter(|&c| c > 1)?;
        let request = self.request(cursor, self.sort_order)?;
        self.back_page = Some(cursor - 1);
        Some(request)
    }

    /// Request the page behind the current one
    pub fn previous(&self, cursor: Option<u32>) -> Option<PageRequest> {
        let page = match cursor {
            Some(c) if c > 2 => c - 2,
            _ => self.back_page.filter(|&p| p > 0)?,
        };
        self.request(page, self.sort_order)
    }

    /// Flip the sort order. Position is meaningless across orders, so restart at page 1.
    pub fn toggle_sort(&mut self) -> Option<PageRequest> {
        self.sort_order = self.sort_order.toggled();
        self.back_page = None;
        self.request(1, self.sort_order)
    }

    /// First page, best ranks first
    pub fn refresh(&mut self) -> Option<PageRequest> {
        let request = self.request(1, SortOrder::Descending)?;
        self.sort_order = SortOrder::Descending;
        self.back_page = None;
        Some(request)
    }
}
