//! Debounced, paginated search over the macro catalog.
//!
//! [`MacroPager`] is owned by a single event loop. Work that completes later
//! (debounce timers, catalog requests) runs on spawned tasks that report back
//! as [`PagerEvent`]s on the pager's channel; the owner feeds each one to
//! [`MacroPager::handle_event`]. Every read and write of the cache, the pending
//! set and the name index therefore happens inside one synchronous call.
//!
//! Network calls are never cancelled. A completion that no longer matches the
//! live input is still merged into the cache but not rendered.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use ghmacros_protocol::MacroItem;
use ghmacros_protocol::SystemMessage;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::cache::DEFAULT_MAX_CACHED_QUERIES;
use crate::cache::MacroCache;
use crate::cache::NameLookup;
use crate::cache::PageState;
use crate::catalog::CatalogError;
use crate::catalog::MacroCatalog;
use crate::catalog::SearchPage;
use crate::persist::RestoreReport;
use crate::persist::restore_suggestions;
use crate::scroll::DEFAULT_LOAD_MORE_THRESHOLD_PX;
use crate::scroll::ScrollMetrics;
use crate::store::KeyValueStore;
use crate::top_usages::TopUsages;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Where results are painted.
pub trait RenderSink {
    /// `state` is everything accumulated for `query`. `is_first_page` is false
    /// when the call follows a load-more.
    fn render(&mut self, query: &str, state: &PageState, is_first_page: bool);

    /// A fetch for the live `query` failed; clear any loading indicator.
    fn render_error(&mut self, query: &str);
}

/// Why a page was requested; decides how its completion is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOrigin {
    /// First page for a debounced query.
    Interactive,
    /// Next page after a scroll near the end.
    LoadMore,
    /// Page 0 of the suggestions listing when the popup opens.
    SuggestionsRefresh,
}

#[derive(Debug)]
pub enum PagerEvent {
    DebounceElapsed {
        generation: u64,
        query: String,
    },
    PageFetched {
        query: String,
        page: u32,
        origin: FetchOrigin,
        result: Result<SearchPage, CatalogError>,
    },
    NameResolved {
        name: String,
        result: Result<Vec<MacroItem>, CatalogError>,
    },
}

/// Side effects the owner is expected to carry out after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PagerNotice {
    /// A fresh suggestions page arrived and should be saved as the snapshot.
    PersistSuggestions(SearchPage),
    /// A response carried a system message.
    SystemMessage(SystemMessage),
    /// An exact-name lookup finished. `url` is `None` when the name does not
    /// exist.
    MacroResolved { name: String, url: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PagerConfig {
    pub debounce: Duration,
    pub load_more_threshold_px: f64,
    pub max_cached_queries: usize,
}

impl Default for PagerConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            load_more_threshold_px: DEFAULT_LOAD_MORE_THRESHOLD_PX,
            max_cached_queries: DEFAULT_MAX_CACHED_QUERIES,
        }
    }
}

struct DebounceTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

pub struct MacroPager<C: MacroCatalog, S: RenderSink> {
    catalog: Arc<C>,
    sink: S,
    event_tx: UnboundedSender<PagerEvent>,
    config: PagerConfig,
    cache: MacroCache,
    /// Queries with an interactive page-0 fetch outstanding.
    pending: HashSet<String>,
    /// Names with an exact lookup outstanding.
    pending_names: HashSet<String>,
    debounce: Option<DebounceTimer>,
    generation: u64,
    /// What the search box currently shows; `None` while the popup is closed.
    live_input: Option<String>,
    loading_more: bool,
    suggestions_in_flight: bool,
}

impl<C: MacroCatalog, S: RenderSink> MacroPager<C, S> {
    pub fn new(
        catalog: Arc<C>,
        sink: S,
        event_tx: UnboundedSender<PagerEvent>,
        config: PagerConfig,
    ) -> Self {
        let cache = MacroCache::new(config.max_cached_queries);
        Self {
            catalog,
            sink,
            event_tx,
            config,
            cache,
            pending: HashSet::new(),
            pending_names: HashSet::new(),
            debounce: None,
            generation: 0,
            live_input: None,
            loading_more: false,
            suggestions_in_flight: false,
        }
    }

    pub fn lookup(&self, query: &str) -> Option<&PageState> {
        self.cache.lookup(query)
    }

    pub fn merge_page(
        &mut self,
        query: &str,
        items: Vec<MacroItem>,
        is_real_page: bool,
        has_more: bool,
    ) -> usize {
        self.cache.merge_page(query, items, is_real_page, has_more)
    }

    /// Seed the suggestions listing from the previous session.
    pub fn restore_from_store(
        &mut self,
        store: &dyn KeyValueStore,
        top_usages: &TopUsages,
        now: DateTime<Utc>,
        freshness: Duration,
    ) -> RestoreReport {
        let report = restore_suggestions(store, &mut self.cache, top_usages, now, freshness);
        tracing::debug!("restored suggestions: {report:?}");
        report
    }

    /// Issue exactly one catalog request for `page` of `query`. The result
    /// arrives as [`PagerEvent::PageFetched`].
    pub fn request_page(&self, query: &str, page: u32, origin: FetchOrigin) {
        let catalog = Arc::clone(&self.catalog);
        let tx = self.event_tx.clone();
        let query = query.to_string();
        tokio::spawn(async move {
            let result = catalog.search(&query, page).await;
            let _ = tx.send(PagerEvent::PageFetched {
                query,
                page,
                origin,
                result,
            });
        });
    }

    /// Interactive entry point, called on every edit of the search box.
    ///
    /// A cached query renders immediately. A query whose first page is already
    /// being fetched is left alone. Anything else gets a page-0 fetch once the
    /// input has been quiet for the debounce delay.
    pub fn debounced_search(&mut self, query: &str) {
        self.live_input = Some(query.to_string());
        self.cancel_debounce();

        if self.cache.lookup(query).is_some() {
            self.cache.touch(query);
            self.render_cached(query, true);
            return;
        }
        if self.pending.contains(query) {
            return;
        }
        self.schedule_debounce(query);
    }

    /// The popup opened on an empty search box: show suggestions.
    ///
    /// Cached suggestions render at once and are refreshed silently in the
    /// background. Only one suggestions request is outstanding at a time.
    pub fn open_suggestions(&mut self) {
        self.live_input = Some(String::new());
        self.cancel_debounce();

        let cached = self.cache.lookup("").is_some();
        if cached {
            self.render_cached("", true);
        }
        if self.suggestions_in_flight {
            return;
        }
        self.suggestions_in_flight = true;
        if !cached {
            self.pending.insert(String::new());
        }
        self.request_page("", 0, FetchOrigin::SuggestionsRefresh);
    }

    /// Request the next page of the live query when the container is
    /// scrolled near its end. Returns whether a request was issued.
    pub fn on_scroll(&mut self, metrics: ScrollMetrics) -> bool {
        if self.loading_more || !metrics.near_end(self.config.load_more_threshold_px) {
            return false;
        }
        let Some(query) = self.live_input.clone() else {
            return false;
        };
        let Some(state) = self.cache.lookup(&query) else {
            return false;
        };
        if !state.has_more() {
            return false;
        }

        let page = state.next_page();
        self.loading_more = true;
        self.request_page(&query, page, FetchOrigin::LoadMore);
        true
    }

    /// The popup closed. Outstanding requests still land in the cache.
    pub fn close(&mut self) {
        self.cancel_debounce();
        self.live_input = None;
    }

    /// Set the live input without searching, e.g. when the owner restores
    /// the search box text.
    pub fn set_live_input(&mut self, text: Option<String>) {
        self.live_input = text;
    }

    pub fn live_input(&self) -> Option<&str> {
        self.live_input.as_deref()
    }

    /// What the name index knows about `name`, starting an exact lookup when
    /// it knows nothing. The lookup's outcome arrives as
    /// [`PagerNotice::MacroResolved`].
    pub fn resolve_name(&mut self, name: &str) -> NameLookup {
        let lookup = self.cache.resolve_name(name);
        if lookup == NameLookup::Unknown && self.pending_names.insert(name.to_string()) {
            let catalog = Arc::clone(&self.catalog);
            let tx = self.event_tx.clone();
            let name = name.to_string();
            tokio::spawn(async move {
                let result = catalog.get(&name).await;
                let _ = tx.send(PagerEvent::NameResolved { name, result });
            });
        }
        lookup
    }

    /// Make a freshly added macro resolvable by name.
    pub fn record_added(&mut self, item: &MacroItem) {
        self.cache.record_name(&item.name, Some(item.url.clone()));
    }

    pub fn handle_event(&mut self, event: PagerEvent) -> Vec<PagerNotice> {
        let mut notices = Vec::new();
        match event {
            PagerEvent::DebounceElapsed { generation, query } => {
                self.on_debounce_elapsed(generation, query);
            }
            PagerEvent::PageFetched {
                query,
                page,
                origin,
                result,
            } => match result {
                Ok(fetched) => self.on_page_fetched(&query, page, origin, fetched, &mut notices),
                Err(err) => self.on_page_failed(&query, page, origin, &err),
            },
            PagerEvent::NameResolved { name, result } => {
                self.pending_names.remove(&name);
                match result {
                    Ok(items) => {
                        let url = items.into_iter().next().map(|item| item.url);
                        self.cache.record_name(&name, url.clone());
                        notices.push(PagerNotice::MacroResolved { name, url });
                    }
                    Err(err) => tracing::debug!("lookup of macro {name:?} failed: {err}"),
                }
            }
        }
        notices
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    fn on_debounce_elapsed(&mut self, generation: u64, query: String) {
        if self
            .debounce
            .as_ref()
            .is_none_or(|timer| timer.generation != generation)
        {
            return;
        }
        self.debounce = None;

        if self.cache.lookup(&query).is_some() {
            if self.is_live(&query) {
                self.render_cached(&query, true);
            }
            return;
        }
        if !self.pending.insert(query.clone()) {
            return;
        }
        self.request_page(&query, 0, FetchOrigin::Interactive);
    }

    fn on_page_fetched(
        &mut self,
        query: &str,
        page: u32,
        origin: FetchOrigin,
        fetched: SearchPage,
        notices: &mut Vec<PagerNotice>,
    ) {
        if let Some(message) = fetched.system_message.clone() {
            notices.push(PagerNotice::SystemMessage(message));
        }

        match origin {
            FetchOrigin::Interactive => {
                self.pending.remove(query);
            }
            FetchOrigin::LoadMore => self.loading_more = false,
            FetchOrigin::SuggestionsRefresh => {
                self.suggestions_in_flight = false;
                self.pending.remove(query);
                notices.push(PagerNotice::PersistSuggestions(SearchPage::new(
                    fetched.items.clone(),
                    fetched.has_more,
                )));
            }
        }

        // A page only moves the cursor when it is the one the cursor points
        // at; a refresh of page 0 over a longer listing does not.
        let is_real_page = self.is_next_page(query, page);
        self.cache
            .merge_page(query, fetched.items, is_real_page, fetched.has_more);

        if !self.is_live(query) {
            tracing::debug!("dropping stale page {page} for {query:?}");
            return;
        }
        let is_first_page = origin != FetchOrigin::LoadMore;
        self.render_cached(query, is_first_page);
    }

    fn on_page_failed(&mut self, query: &str, page: u32, origin: FetchOrigin, err: &CatalogError) {
        match origin {
            FetchOrigin::Interactive => {
                self.pending.remove(query);
                tracing::warn!("search for {query:?} failed: {err}");
                if self.is_live(query) {
                    self.sink.render_error(query);
                }
            }
            FetchOrigin::LoadMore => {
                self.loading_more = false;
                tracing::debug!("loading page {page} of {query:?} failed: {err}");
            }
            FetchOrigin::SuggestionsRefresh => {
                self.suggestions_in_flight = false;
                self.pending.remove(query);
                tracing::debug!("refreshing suggestions failed: {err}");
            }
        }
    }

    fn is_next_page(&self, query: &str, page: u32) -> bool {
        match self.cache.lookup(query) {
            Some(state) => state.next_page() == page,
            None => page == 0,
        }
    }

    fn is_live(&self, query: &str) -> bool {
        self.live_input.as_deref() == Some(query)
    }

    fn render_cached(&mut self, query: &str, is_first_page: bool) {
        if let Some(state) = self.cache.lookup(query) {
            self.sink.render(query, state, is_first_page);
        }
    }

    fn schedule_debounce(&mut self, query: &str) {
        self.generation += 1;
        let generation = self.generation;
        let delay = self.config.debounce;
        let tx = self.event_tx.clone();
        let query = query.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(PagerEvent::DebounceElapsed { generation, query });
        });
        self.debounce = Some(DebounceTimer { generation, handle });
    }

    fn cancel_debounce(&mut self) {
        if let Some(timer) = self.debounce.take() {
            timer.handle.abort();
        }
    }
}

impl<C: MacroCatalog, S: RenderSink> Drop for MacroPager<C, S> {
    fn drop(&mut self) {
        self.cancel_debounce();
    }
}
