use serde::Deserialize;
use serde::Serialize;

use crate::MacroItem;

/// The `type` parameter of the catalog's query endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Free-text search over macro names.
    Search,
    /// Default listing shown for an empty query.
    Suggestion,
    /// Exact-name lookup.
    Get,
}

impl QueryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::Search => "search",
            QueryKind::Suggestion => "suggestion",
            QueryKind::Get => "get",
        }
    }

    /// Paginated listings use `search` for non-empty text and `suggestion` otherwise.
    pub fn for_listing(text: &str) -> Self {
        if text.is_empty() {
            QueryKind::Suggestion
        } else {
            QueryKind::Search
        }
    }
}

/// Body returned by the query endpoint.
///
/// `has_more` is only present for paginated (`search`/`suggestion`) responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub data: Vec<MacroItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_more: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<SystemMessage>,
}

/// Announcement piggybacked on query responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemMessage {
    pub id: String,
    /// HTML fragment shown to the user.
    pub content: String,
    pub total_impressions: u32,
    /// Minimum number of seconds between two impressions.
    #[serde(default)]
    pub snooze_time: i64,
    #[serde(default)]
    pub number_of_impressions: u32,
    /// Unix seconds of the last impression.
    #[serde(default)]
    pub impression_time: i64,
}
