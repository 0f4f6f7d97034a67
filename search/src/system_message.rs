//! Announcements delivered alongside query responses.

use ghmacros_protocol::SystemMessage;

use crate::store::KeyValueStore;
use crate::store::StoreError;

pub const SYSTEM_MESSAGE_KEY: &str = "system_message";

/// Remember `message` unless it is the one already stored. A new message
/// starts with no impressions.
pub fn remember(store: &mut dyn KeyValueStore, message: &SystemMessage) -> Result<bool, StoreError> {
    if stored(store).is_some_and(|prev| prev.id == message.id) {
        return Ok(false);
    }
    let fresh = SystemMessage {
        number_of_impressions: 0,
        impression_time: 0,
        ..message.clone()
    };
    write(store, &fresh)?;
    Ok(true)
}

/// The stored message if it should be shown at `now` (unix seconds).
pub fn pending(store: &dyn KeyValueStore, now: i64) -> Option<SystemMessage> {
    let message = stored(store)?;
    if message.number_of_impressions >= message.total_impressions {
        return None;
    }
    if now - message.impression_time < message.snooze_time {
        return None;
    }
    Some(message)
}

/// Count one dismissal of `message` at `now`.
pub fn record_impression(
    store: &mut dyn KeyValueStore,
    message: &SystemMessage,
    now: i64,
) -> Result<(), StoreError> {
    let updated = SystemMessage {
        number_of_impressions: message.number_of_impressions + 1,
        impression_time: now,
        ..message.clone()
    };
    write(store, &updated)
}

fn stored(store: &dyn KeyValueStore) -> Option<SystemMessage> {
    let raw = store.get(SYSTEM_MESSAGE_KEY)?;
    serde_json::from_str(&raw)
        .inspect_err(|err| tracing::debug!("ignoring stored system message: {err}"))
        .ok()
}

fn write(store: &mut dyn KeyValueStore, message: &SystemMessage) -> Result<(), StoreError> {
    let json = serde_json::to_string(message)?;
    store.set(&[(SYSTEM_MESSAGE_KEY, json.as_str())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn message(id: &str) -> SystemMessage {
        SystemMessage {
            id: id.to_string(),
            content: "<b>hello</b>".to_string(),
            total_impressions: 2,
            snooze_time: 60,
            number_of_impressions: 0,
            impression_time: 0,
        }
    }

    #[test]
    fn same_id_is_not_reset() {
        let mut store = MemoryStore::new();
        assert!(remember(&mut store, &message("m1")).expect("remember"));
        record_impression(&mut store, &message("m1"), 1_000).expect("impression");

        assert!(!remember(&mut store, &message("m1")).expect("remember again"));
        assert_eq!(
            stored(&store).map(|m| m.number_of_impressions),
            Some(1)
        );

        assert!(remember(&mut store, &message("m2")).expect("new id"));
        assert_eq!(
            stored(&store).map(|m| (m.id, m.number_of_impressions)),
            Some(("m2".to_string(), 0))
        );
    }

    #[test]
    fn snooze_and_impression_budget_gate_display() {
        let mut store = MemoryStore::new();
        remember(&mut store, &message("m1")).expect("remember");

        let first = pending(&store, 1_000).expect("shown initially");
        record_impression(&mut store, &first, 1_000).expect("impression");
        assert_eq!(pending(&store, 1_030), None);

        let second = pending(&store, 1_060).expect("shown after snooze");
        record_impression(&mut store, &second, 1_060).expect("impression");
        assert_eq!(pending(&store, 10_000), None);
    }

    #[test]
    fn nothing_stored_means_nothing_pending() {
        let store = MemoryStore::new();
        assert_eq!(pending(&store, 0), None);
    }
}
