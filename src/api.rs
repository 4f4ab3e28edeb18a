//! HTTP client for the leaderboard service.
//!
//! This module provides:
//!
//! - `LeaderboardClient`: reqwest wrapper issuing one `GET /gamer` per page
//! - `LeaderboardEntry` and `LeaderboardPage`: the validated response envelope
//! - `FetchError`: classified failures (rate limit, server message, transport, malformed)
//! - `PageSource`: the seam the leaderboard state fetches through
//!
//! The service only reports the page that would be fetched *next* (`nextPage`).
//! There is no reverse cursor, so backwards navigation is derived by the caller.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use anyhow::Result;
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// User agent for API requests
const USER_AGENT: &str = concat!("leaderboard/", env!("CARGO_PKG_VERSION"));

/// Message shown for HTTP 429, regardless of the response body
pub const RATE_LIMITED_MESSAGE: &str = "Too many requests";

/// Which leaderboard view to browse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Range {
    Global,
    Top100,
}

impl Range {
    /// Value sent as the `view` query parameter
    pub fn as_query(&self) -> &'static str {
        match self {
            Range::Global => "global",
            Range::Top100 => "hundred",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Range::Global => "Global Leaderboard",
            Range::Top100 => "Top 100",
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_query())
    }
}

impl FromStr for Range {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "global" => Ok(Range::Global),
            "hundred" | "top100" | "top-100" => Ok(Range::Top100),
            other => Err(format!(
                "Unknown range '{}' (expected 'global' or 'top100')",
                other
            )),
        }
    }
}

/// Rank ordering requested from the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    /// Value sent as the `sortOrder` query parameter
    pub fn as_query(&self) -> i8 {
        match self {
            SortOrder::Ascending => 1,
            SortOrder::Descending => -1,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Ascending => f.write_str("ascending"),
            SortOrder::Descending => f.write_str("descending"),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" | "1" => Ok(SortOrder::Ascending),
            "desc" | "descending" | "-1" => Ok(SortOrder::Descending),
            other => Err(format!("Unknown sort order '{}' (expected 'asc' or 'desc')", other)),
        }
    }
}

/// A single fully-specified page request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub event_name: String,
    pub range: Range,
    pub page: u32,
    pub size: u32,
    pub sort_order: SortOrder,
}

/// One ranked row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub name: String,
    #[serde(default, alias = "pic")]
    pub picture: Option<String>,
    pub score: f64,
}

impl LeaderboardEntry {
    /// Path the avatar image is served from
    pub fn avatar_path(&self) -> Option<String> {
        self.picture.as_ref().map(|pic| format!("/avatars/{}", pic))
    }
}

/// One page of results plus the server's forward cursor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardPage {
    pub entities: Vec<LeaderboardEntry>,
    #[serde(rename = "nextPage", default, deserialize_with = "deserialize_cursor")]
    pub next_page: Option<u32>,
}

/// `nextPage` arrives as a string (sometimes a number). Anything unparsable means
/// "no further pages".
fn deserialize_cursor<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| match value {
        serde_json::Value::String(s) => s.trim().parse().ok(),
        serde_json::Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        _ => None,
    }))
}

/// Errors that can occur while fetching a page
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("{}", RATE_LIMITED_MESSAGE)]
    RateLimited,

    #[error("{0}")]
    ServerReported(String),

    #[error("Network error: {0}")]
    TransportFailure(String),

    #[error("Unexpected response: {0}")]
    Unclassified(String),
}

/// Body shape of a non-2xx response
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Classify a non-2xx, non-429 response from its status and body text
fn classify_error_body(status: StatusCode, body: &str) -> FetchError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { message: Some(message) }) => FetchError::ServerReported(message),
        Ok(ErrorBody { message: None }) => {
            FetchError::ServerReported(format!("Server returned {}", status))
        }
        Err(e) => FetchError::Unclassified(format!("{} ({})", status, e)),
    }
}

/// Anything that can produce leaderboard pages.
///
/// Implemented by `LeaderboardClient`; tests substitute in-memory sources.
pub trait PageSource: Clone + Send + Sync + 'static {
    fn fetch_page(
        &self,
        request: PageRequest,
    ) -> impl Future<Output = Result<LeaderboardPage, FetchError>> + Send;
}

/// Leaderboard API client
#[derive(Clone)]
pub struct LeaderboardClient {
    client: reqwest::Client,
    base_url: String,
}

impl LeaderboardClient {
    /// Create a new client for the given service base URL
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one page of the leaderboard
    pub async fn get_page(&self, request: &PageRequest) -> Result<LeaderboardPage, FetchError> {
        let start = std::time::Instant::now();
        let url = format!("{}/gamer", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("event_name", request.event_name.clone()),
                ("view", request.range.as_query().to_string()),
                ("page", request.page.to_string()),
                ("size", request.size.to_string()),
                ("sortOrder", request.sort_order.as_query().to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                tracing::warn!("Request to {} failed: {}", url, e);
                FetchError::TransportFailure(e.to_string())
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!("Rate limited by leaderboard service");
            return Err(FetchError::RateLimited);
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::TransportFailure(e.to_string()))?;

        if !status.is_success() {
            let error = classify_error_body(status, &body);
            tracing::warn!("Leaderboard API error: {} - {}", status, error);
            return Err(error);
        }

        let page: LeaderboardPage =
            serde_json::from_str(&body).map_err(|e| FetchError::Unclassified(e.to_string()))?;

        tracing::debug!(
            "Fetched {} entries for '{}' page {} in {:.2}s (next: {:?})",
            page.entities.len(),
            request.event_name,
            request.page,
            start.elapsed().as_secs_f32(),
            page.next_page
        );

        Ok(page)
    }
}

impl PageSource for LeaderboardClient {
    fn fetch_page(
        &self,
        request: PageRequest,
    ) -> impl Future<Output = Result<LeaderboardPage, FetchError>> + Send {
        async move { self.get_page(&request).await }
    }
}
