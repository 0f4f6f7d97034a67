//! The remote macro catalog as seen by the pager.

use std::future::Future;

use ghmacros_protocol::AddMacroResponse;
use ghmacros_protocol::MacroItem;
use ghmacros_protocol::SystemMessage;
use ghmacros_protocol::UsageTrigger;

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
    pub items: Vec<MacroItem>,
    pub has_more: bool,
    pub system_message: Option<SystemMessage>,
}

impl SearchPage {
    pub fn new(items: Vec<MacroItem>, has_more: bool) -> Self {
        Self {
            items,
            has_more,
            system_message: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The body did not have the expected shape. Treated like a network
    /// failure; nothing from the body is used.
    #[error("malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    #[error("invalid catalog endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

/// Request/response access to the catalog service.
///
/// Implementations are shared with spawned fetch tasks, hence the `Send +
/// Sync + 'static` bound and `Send` futures.
pub trait MacroCatalog: Send + Sync + 'static {
    /// One page of results; empty `text` lists suggestions.
    fn search(
        &self,
        text: &str,
        page: u32,
    ) -> impl Future<Output = Result<SearchPage, CatalogError>> + Send;

    /// Exact-name lookup. An empty vector means the name does not exist.
    fn get(&self, name: &str) -> impl Future<Output = Result<Vec<MacroItem>, CatalogError>> + Send;

    /// Submit a new macro. `github_url` is the GitHub-hosted copy of `url`, if any.
    fn add(
        &self,
        name: &str,
        url: &str,
        github_url: Option<&str>,
    ) -> impl Future<Output = Result<AddMacroResponse, CatalogError>> + Send;

    fn report_usage(
        &self,
        name: &str,
        trigger: UsageTrigger,
    ) -> impl Future<Output = Result<(), CatalogError>> + Send;

    /// Flag a macro whose image no longer loads.
    fn report_broken(&self, name: &str) -> impl Future<Output = Result<(), CatalogError>> + Send;
}
