//! Startup restore and shutdown-safe saves of the suggestions listing.

use std::cmp::Ordering;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use ghmacros_protocol::QueryResponse;

use crate::cache::MacroCache;
use crate::catalog::SearchPage;
use crate::store::KeyValueStore;
use crate::store::StoreError;
use crate::system_message::SYSTEM_MESSAGE_KEY;
use crate::top_usages::TOP_USAGES_KEY;
use crate::top_usages::TOP_USAGES_TO_DISPLAY;
use crate::top_usages::TopUsages;
use crate::version::compare_versions;

pub const SUGGESTIONS_KEY: &str = "suggestions";
pub const SUGGESTIONS_FRESHNESS_KEY: &str = "suggestions_freshness";
pub const VERSION_KEY: &str = "version";

/// Restored suggestions older than this are ignored.
pub const DEFAULT_SUGGESTIONS_FRESHNESS: Duration = Duration::from_secs(60 * 60 * 24);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionGate {
    /// First run or a newer major/minor client: stored listings were wiped.
    Reset,
    /// Patch-level change: only the recorded version moved.
    Updated,
    Unchanged,
}

/// Drop cached listings written by an older major/minor client.
pub fn apply_version_gate(
    store: &mut dyn KeyValueStore,
    current: &str,
) -> Result<VersionGate, StoreError> {
    let stored = store.get(VERSION_KEY);
    let needs_reset = stored
        .as_deref()
        .is_none_or(|stored| compare_versions(current, stored, Some(2)) == Ordering::Greater);

    if needs_reset {
        store.set(&[
            (SUGGESTIONS_KEY, ""),
            (SUGGESTIONS_FRESHNESS_KEY, ""),
            (SYSTEM_MESSAGE_KEY, ""),
            (TOP_USAGES_KEY, ""),
            (VERSION_KEY, current),
        ])?;
        return Ok(VersionGate::Reset);
    }

    if stored.as_deref() != Some(current) {
        store.set(&[(VERSION_KEY, current)])?;
        return Ok(VersionGate::Updated);
    }
    Ok(VersionGate::Unchanged)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotRestore {
    Merged { items: usize },
    Stale,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreReport {
    pub seeded_top_usages: usize,
    pub snapshot: SnapshotRestore,
}

/// Seed the suggestions query (`""`) from `store`: top usages first as a
/// local page, then the last suggestions response if it is fresh enough.
pub fn restore_suggestions(
    store: &dyn KeyValueStore,
    cache: &mut MacroCache,
    top_usages: &TopUsages,
    now: DateTime<Utc>,
    freshness: Duration,
) -> RestoreReport {
    let mut seeded_top_usages = 0;
    if !top_usages.entries().is_empty() {
        seeded_top_usages = cache.merge_page(
            "",
            top_usages.display_items(TOP_USAGES_TO_DISPLAY),
            false,
            true,
        );
    }

    RestoreReport {
        seeded_top_usages,
        snapshot: restore_snapshot(store, cache, now, freshness),
    }
}

fn restore_snapshot(
    store: &dyn KeyValueStore,
    cache: &mut MacroCache,
    now: DateTime<Utc>,
    freshness: Duration,
) -> SnapshotRestore {
    let (Some(raw), Some(saved_at)) = (
        store.get(SUGGESTIONS_KEY),
        store.get(SUGGESTIONS_FRESHNESS_KEY),
    ) else {
        return SnapshotRestore::Missing;
    };

    let Some(saved_at) = parse_timestamp(&saved_at) else {
        tracing::debug!("ignoring suggestions snapshot with bad timestamp {saved_at:?}");
        return SnapshotRestore::Missing;
    };
    if !is_fresh(saved_at, now, freshness) {
        tracing::debug!("suggestions snapshot from {saved_at} is stale");
        return SnapshotRestore::Stale;
    }

    let response: QueryResponse = match serde_json::from_str(&raw) {
        Ok(response) => response,
        Err(err) => {
            tracing::debug!("ignoring unreadable suggestions snapshot: {err}");
            return SnapshotRestore::Missing;
        }
    };
    let items = cache.merge_page("", response.data, true, true);
    SnapshotRestore::Merged { items }
}

/// Persist the latest suggestions response together with its fetch time.
pub fn save_suggestions_snapshot(
    store: &mut dyn KeyValueStore,
    page: &SearchPage,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let response = QueryResponse {
        data: page.items.clone(),
        has_more: Some(page.has_more),
        system_message: None,
    };
    let json = serde_json::to_string(&response)?;
    let saved_at = now.to_rfc3339();
    store.set(&[
        (SUGGESTIONS_KEY, json.as_str()),
        (SUGGESTIONS_FRESHNESS_KEY, saved_at.as_str()),
    ])
}

/// A snapshot stamped in the future (clock skew) counts as fresh.
fn is_fresh(saved_at: DateTime<Utc>, now: DateTime<Utc>, freshness: Duration) -> bool {
    match (now - saved_at).to_std() {
        Ok(age) => age <= freshness,
        Err(_) => true,
    }
}

/// RFC3339, or the epoch-milliseconds form older clients wrote.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    raw.trim()
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
}
