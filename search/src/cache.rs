//! Per-query result accumulation with a global name index.
//!
//! Every item name is owned by at most one query: the first query whose page
//! delivered it. Later pages (under any query) that repeat the name are
//! skipped, so the same macro always resolves to the same url.

use std::collections::HashMap;
use std::collections::VecDeque;

use ghmacros_protocol::MacroItem;

/// Default bound on distinct non-empty query keys kept in memory.
pub const DEFAULT_MAX_CACHED_QUERIES: usize = 256;

/// Accumulated, deduplicated results for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageState {
    items: Vec<MacroItem>,
    next_page: u32,
    has_more: bool,
}

impl PageState {
    /// Items in arrival order.
    pub fn items(&self) -> &[MacroItem] {
        &self.items
    }

    /// 0-based index of the next page to request.
    pub fn next_page(&self) -> u32 {
        self.next_page
    }

    /// Whether the last fetch reported more pages.
    pub fn has_more(&self) -> bool {
        self.has_more
    }
}

/// What the name index knows about a macro name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameLookup {
    /// The name resolves to this url.
    Known(String),
    /// An exact lookup already found nothing for this name.
    Missing,
    /// Nothing recorded yet.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameEntry {
    /// Delivered by a page of `query`; blocks later merges.
    Listed { url: String, query: String },
    /// Resolved by an exact lookup or a fresh add; does not block merges.
    Resolved { url: String },
    Missing,
}

/// Query-keyed page cache.
///
/// Non-empty query keys are bounded by an LRU; the suggestions query (`""`) is
/// never evicted.
#[derive(Debug)]
pub struct MacroCache {
    pages: HashMap<String, PageState>,
    /// Non-empty query keys, least recently used first.
    recency: VecDeque<String>,
    names: HashMap<String, NameEntry>,
    max_queries: usize,
}

impl Default for MacroCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CACHED_QUERIES)
    }
}

impl MacroCache {
    pub fn new(max_queries: usize) -> Self {
        Self {
            pages: HashMap::new(),
            recency: VecDeque::new(),
            names: HashMap::new(),
            max_queries: max_queries.max(1),
        }
    }

    /// Exact-key read; no fuzzy matching.
    pub fn lookup(&self, query: &str) -> Option<&PageState> {
        self.pages.get(query)
    }

    /// Mark `query` as recently used so it is evicted last.
    pub fn touch(&mut self, query: &str) {
        if query.is_empty() || !self.pages.contains_key(query) {
            return;
        }
        if let Some(pos) = self.recency.iter().position(|q| q == query) {
            self.recency.remove(pos);
        }
        self.recency.push_back(query.to_string());
    }

    /// Append `items` to `query`, skipping names already listed anywhere in the
    /// cache. Returns how many items were appended.
    ///
    /// `next_page` advances only when `is_real_page` is set; `has_more` is
    /// always overwritten.
    pub fn merge_page(
        &mut self,
        query: &str,
        items: Vec<MacroItem>,
        is_real_page: bool,
        has_more: bool,
    ) -> usize {
        let created = !self.pages.contains_key(query);
        let state = self.pages.entry(query.to_string()).or_default();

        let mut appended = 0;
        for item in items {
            if matches!(self.names.get(&item.name), Some(NameEntry::Listed { .. })) {
                continue;
            }
            self.names.insert(
                item.name.clone(),
                NameEntry::Listed {
                    url: item.url.clone(),
                    query: query.to_string(),
                },
            );
            state.items.push(item);
            appended += 1;
        }

        if is_real_page {
            state.next_page += 1;
        }
        state.has_more = has_more;

        if created && !query.is_empty() {
            self.recency.push_back(query.to_string());
            self.evict_overflow();
        } else {
            self.touch(query);
        }
        appended
    }

    pub fn resolve_name(&self, name: &str) -> NameLookup {
        match self.names.get(name) {
            Some(NameEntry::Listed { url, .. }) | Some(NameEntry::Resolved { url }) => {
                NameLookup::Known(url.clone())
            }
            Some(NameEntry::Missing) => NameLookup::Missing,
            None => NameLookup::Unknown,
        }
    }

    /// Record the outcome of an exact-name lookup (or a successful add).
    /// Names already listed by a page keep their listing.
    pub fn record_name(&mut self, name: &str, url: Option<String>) {
        if matches!(self.names.get(name), Some(NameEntry::Listed { .. })) {
            return;
        }
        let entry = match url {
            Some(url) => NameEntry::Resolved { url },
            None => NameEntry::Missing,
        };
        self.names.insert(name.to_string(), entry);
    }

    /// Number of cached query keys, including `""`.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    fn evict_overflow(&mut self) {
        while self.recency.len() > self.max_queries {
            let Some(evicted) = self.recency.pop_front() else {
                return;
            };
            let Some(state) = self.pages.remove(&evicted) else {
                continue;
            };
            // Names are owned by the query that listed them first, so the
            // evicted page's items can be listed again by a later fetch.
            for item in state.items {
                if matches!(
                    self.names.get(&item.name),
                    Some(NameEntry::Listed { query, .. }) if *query == evicted
                ) {
                    self.names.remove(&item.name);
                }
            }
            tracing::debug!("evicted cached query {evicted:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item(name: &str, url: &str) -> MacroItem {
        MacroItem::new(name, url)
    }

    fn names(state: &PageState) -> Vec<&str> {
        state.items().iter().map(|item| item.name.as_str()).collect()
    }

    #[test]
    fn merges_pages_with_dedup_and_pagination() {
        let mut cache = MacroCache::default();
        cache.merge_page("", vec![item("a", "u1"), item("b", "u2")], true, true);
        cache.merge_page("", vec![item("b", "u2"), item("c", "u3")], true, false);

        let Some(state) = cache.lookup("") else {
            panic!("suggestions should be cached");
        };
        assert_eq!(names(state), vec!["a", "b", "c"]);
        assert_eq!(state.next_page(), 2);
        assert!(!state.has_more());
    }

    #[test]
    fn names_listed_under_one_query_are_skipped_under_another() {
        let mut cache = MacroCache::default();
        cache.merge_page("cat", vec![item("cat-dance", "u1")], true, false);
        let appended = cache.merge_page(
            "dance",
            vec![item("cat-dance", "other"), item("dance", "u2")],
            true,
            false,
        );

        assert_eq!(appended, 1);
        assert_eq!(cache.lookup("dance").map(names), Some(vec!["dance"]));
        assert_eq!(
            cache.resolve_name("cat-dance"),
            NameLookup::Known("u1".to_string())
        );
    }

    #[test]
    fn local_pages_do_not_advance_the_cursor() {
        let mut cache = MacroCache::default();
        cache.merge_page("", vec![item("fav", "u")], false, true);
        assert_eq!(cache.lookup("").map(PageState::next_page), Some(0));

        cache.merge_page("", vec![item("a", "u1")], true, true);
        assert_eq!(cache.lookup("").map(PageState::next_page), Some(1));
    }

    #[test]
    fn empty_page_still_creates_state_and_updates_has_more() {
        let mut cache = MacroCache::default();
        cache.merge_page("nothing", Vec::new(), true, false);
        assert_eq!(
            cache.lookup("nothing").cloned(),
            Some(PageState {
                items: Vec::new(),
                next_page: 1,
                has_more: false,
            })
        );
    }

    #[test]
    fn lookup_is_exact() {
        let mut cache = MacroCache::default();
        cache.merge_page("cat", vec![item("a", "u")], true, true);
        assert!(cache.lookup("ca").is_none());
        assert!(cache.lookup("Cat").is_none());
        assert!(cache.lookup("cat").is_some());
    }

    #[test]
    fn exact_lookups_do_not_block_later_listing() {
        let mut cache = MacroCache::default();
        cache.record_name("ghost", None);
        cache.record_name("party", Some("u-lookup".to_string()));
        assert_eq!(cache.resolve_name("ghost"), NameLookup::Missing);
        assert_eq!(cache.resolve_name("nobody"), NameLookup::Unknown);

        let appended = cache.merge_page(
            "p",
            vec![item("party", "u-page"), item("ghost", "u-ghost")],
            true,
            false,
        );
        assert_eq!(appended, 2);
        assert_eq!(
            cache.resolve_name("ghost"),
            NameLookup::Known("u-ghost".to_string())
        );

        // A listing wins over a later exact lookup.
        cache.record_name("party", None);
        assert_eq!(
            cache.resolve_name("party"),
            NameLookup::Known("u-page".to_string())
        );
    }

    #[test]
    fn evicts_least_recently_used_query_and_frees_its_names() {
        let mut cache = MacroCache::new(2);
        cache.merge_page("", vec![item("s", "u0")], true, true);
        cache.merge_page("one", vec![item("x", "u1")], true, false);
        cache.merge_page("two", vec![item("y", "u2")], true, false);
        cache.touch("one");
        cache.merge_page("three", vec![item("y", "u2"), item("z", "u3")], true, false);

        assert!(cache.lookup("two").is_none());
        assert!(cache.lookup("one").is_some());
        assert!(cache.lookup("").is_some());
        // "y" was listed by a page of the evicted query, so the third query
        // could not list it at merge time but a refetch of "two" can.
        assert_eq!(cache.lookup("three").map(names), Some(vec!["z"]));
        assert_eq!(cache.resolve_name("y"), NameLookup::Unknown);

        cache.merge_page("two", vec![item("y", "u2")], true, false);
        assert_eq!(cache.lookup("two").map(names), Some(vec!["y"]));
        assert_eq!(cache.len(), 3);
    }
}
