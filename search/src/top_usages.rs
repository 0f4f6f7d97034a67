//! Most-used macros, remembered across sessions and shown first in suggestions.

use std::cmp::Reverse;

use ghmacros_protocol::MacroItem;
use serde::Deserialize;
use serde::Serialize;

use crate::store::KeyValueStore;
use crate::store::StoreError;

pub const TOP_USAGES_KEY: &str = "top_usages";

/// Capacity of the persisted ranking.
pub const MAX_TOP_USAGES_TO_STORE: usize = 1;

/// How many ranked entries are seeded into the suggestions listing.
pub const TOP_USAGES_TO_DISPLAY: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopUsage {
    pub name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub usages: u64,
}

impl TopUsage {
    fn from_item(item: &MacroItem) -> Self {
        Self {
            name: item.name.clone(),
            url: item.url.clone(),
            width: item.width,
            height: item.height,
            usages: 1,
        }
    }

    pub fn to_item(&self) -> MacroItem {
        let mut item = MacroItem::new(self.name.clone(), self.url.clone());
        item.width = self.width;
        item.height = self.height;
        item
    }
}

/// Usage ranking, highest count first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopUsages {
    entries: Vec<TopUsage>,
    capacity: usize,
}

impl Default for TopUsages {
    fn default() -> Self {
        Self::with_capacity(MAX_TOP_USAGES_TO_STORE)
    }
}

impl TopUsages {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Load the ranking from `store`. Unparsable data is ignored.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let mut usages = Self::default();
        let Some(raw) = store.get(TOP_USAGES_KEY) else {
            return usages;
        };
        match serde_json::from_str::<Vec<TopUsage>>(&raw) {
            Ok(entries) => {
                usages.entries = entries;
                usages.sort();
            }
            Err(err) => tracing::debug!("ignoring stored top usages: {err}"),
        }
        usages
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<(), StoreError> {
        let json = serde_json::to_string(&self.entries)?;
        store.set(&[(TOP_USAGES_KEY, json.as_str())])
    }

    pub fn entries(&self) -> &[TopUsage] {
        &self.entries
    }

    /// Count one use of `item`. A new name at capacity replaces the
    /// lowest-ranked entry.
    pub fn record(&mut self, item: &MacroItem) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.name == item.name) {
            entry.usages += 1;
        } else {
            if self.entries.len() >= self.capacity {
                self.entries.pop();
            }
            self.entries.push(TopUsage::from_item(item));
        }
        self.sort();
    }

    /// The first `limit` entries as catalog items.
    pub fn display_items(&self, limit: usize) -> Vec<MacroItem> {
        self.entries.iter().take(limit).map(TopUsage::to_item).collect()
    }

    fn sort(&mut self) {
        // Stable: ties keep insertion order.
        self.entries.sort_by_key(|e| Reverse(e.usages));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn names(usages: &TopUsages) -> Vec<(&str, u64)> {
        usages
            .entries()
            .iter()
            .map(|e| (e.name.as_str(), e.usages))
            .collect()
    }

    #[test]
    fn ranks_by_usage_and_evicts_lowest_at_capacity() {
        let mut usages = TopUsages::with_capacity(2);
        let a = MacroItem::new("a", "ua");
        let b = MacroItem::new("b", "ub");
        let c = MacroItem::new("c", "uc");

        usages.record(&a);
        usages.record(&b);
        usages.record(&b);
        assert_eq!(names(&usages), vec![("b", 2), ("a", 1)]);

        usages.record(&c);
        assert_eq!(names(&usages), vec![("b", 2), ("c", 1)]);
    }

    #[test]
    fn default_capacity_keeps_a_single_entry() {
        let mut usages = TopUsages::default();
        usages.record(&MacroItem::new("a", "ua"));
        usages.record(&MacroItem::new("b", "ub"));
        assert_eq!(names(&usages), vec![("b", 1)]);
    }

    #[test]
    fn persists_through_store() {
        let mut store = MemoryStore::new();
        let mut usages = TopUsages::default();
        let mut item = MacroItem::new("party", "u");
        item.width = Some(4);
        item.height = Some(3);
        usages.record(&item);
        usages.record(&item);
        usages.save(&mut store).expect("save");

        let loaded = TopUsages::load(&store);
        assert_eq!(names(&loaded), vec![("party", 2)]);
        assert_eq!(loaded.display_items(20), vec![item]);
    }

    #[test]
    fn garbage_in_store_is_ignored() {
        let mut store = MemoryStore::new();
        store.set(&[(TOP_USAGES_KEY, "{oops")]).expect("set");
        assert!(TopUsages::load(&store).entries().is_empty());
    }
}
