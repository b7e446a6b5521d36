//! Compare lists: per-category id sets persisted in a [`KeyValueStore`].
//!
//! Changes reach listeners through one broadcast channel fed by two
//! sources: writes made through a [`CompareStore`] in this process
//! ([`EventOrigin::Local`]), and writes made by other processes sharing
//! the same database, picked up by a [`StorageWatcher`]
//! ([`EventOrigin::Storage`]). Both carry the same payload so one handler
//! serves either.
//!
//! [`KeyValueStore`]: crate::storage::KeyValueStore

mod reconcile;
mod store;
mod watcher;

use std::collections::HashSet;

use serde::Serialize;

pub use reconcile::{reconcile, Reconciled};
pub use store::{CompareStore, CompareSubscription};
pub use watcher::{StorageWatcher, WatcherHandle};

/// Name of the change notification.
pub const COMPARE_CHANGE_EVENT: &str = "fcbase:compare-change";

/// Capacity of the change broadcast channel.
pub(crate) const EVENT_CAPACITY: usize = 64;

/// Where a change notification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOrigin {
    /// A write through a store in this process.
    Local,
    /// A write by another process, seen by polling storage.
    Storage,
}

/// A compare list changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompareEvent {
    /// The category whose list changed.
    #[serde(rename = "type")]
    pub category: String,
    /// The full list after the change.
    pub ids: Vec<String>,
    /// Which signal path delivered the change.
    pub origin: EventOrigin,
}

/// Persistence key for a category.
#[must_use]
pub fn storage_key(namespace: &str, category: &str) -> String {
    format!("{namespace}:compare:{category}")
}

/// Parse a persisted list.
///
/// Anything that isn't a JSON array yields an empty list; non-string entries
/// are dropped and duplicates removed, keeping first occurrences.
#[must_use]
pub fn parse_list(raw: &str) -> Vec<String> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Array(values)) => dedup(
            values
                .into_iter()
                .filter_map(|value| match value {
                    serde_json::Value::String(id) => Some(id),
                    _ => None,
                }),
        ),
        _ => Vec::new(),
    }
}

/// Remove duplicates, keeping the first occurrence of each id.
pub fn dedup<I>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Serialized form of a list, used for storage and change detection.
pub(crate) fn encode_list(ids: &[String]) -> String {
    // A Vec<String> always serializes.
    serde_json::to_string(ids).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key() {
        assert_eq!(
            storage_key("fcbase", "controller"),
            "fcbase:compare:controller"
        );
    }

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list(r#"["a","b"]"#), vec!["a", "b"]);
        assert_eq!(parse_list(r#"["a","b","a"]"#), vec!["a", "b"]);
        assert_eq!(parse_list(r#"["a",1,null,{"x":1},"c"]"#), vec!["a", "c"]);
    }

    #[test]
    fn test_parse_list_corrupt_is_empty() {
        assert!(parse_list("not json").is_empty());
        assert!(parse_list(r#"{"ids":["a"]}"#).is_empty());
        assert!(parse_list(r#""a""#).is_empty());
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_encode_list() {
        let ids = vec!["a".to_string(), "b".to_string()];
        assert_eq!(encode_list(&ids), r#"["a","b"]"#);
        assert_eq!(encode_list(&[]), "[]");
    }

    #[test]
    fn test_event_serializes_with_type_field() {
        let event = CompareEvent {
            category: "controller".to_string(),
            ids: vec!["a".to_string()],
            origin: EventOrigin::Local,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "controller");
        assert_eq!(json["ids"][0], "a");
        assert_eq!(json["origin"], "local");
    }
}
