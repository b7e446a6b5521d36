//! The persisted compare list store.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, info, warn};

use super::{dedup, encode_list, parse_list, storage_key, CompareEvent, EventOrigin, EVENT_CAPACITY};
use crate::config::{CategoryConfig, CompareConfig};
use crate::error::{Error, Result};
use crate::storage::KeyValueStore;

/// Compare lists for a fixed set of categories.
///
/// Lists are read fresh from the backing store on every call. Legacy keys
/// for a category are folded into its list the first time this store reads
/// that category.
#[derive(Debug)]
pub struct CompareStore<S> {
    store: S,
    namespace: String,
    categories: Vec<CategoryConfig>,
    migrated: Mutex<HashSet<String>>,
    events: broadcast::Sender<CompareEvent>,
}

impl<S: KeyValueStore> CompareStore<S> {
    /// Create a store from the compare configuration.
    #[must_use]
    pub fn new(store: S, config: &CompareConfig) -> Self {
        Self::with_categories(store, &config.namespace, config.categories.clone())
    }

    /// Create a store with explicit categories.
    #[must_use]
    pub fn with_categories(
        store: S,
        namespace: impl Into<String>,
        categories: Vec<CategoryConfig>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            namespace: namespace.into(),
            categories,
            migrated: Mutex::new(HashSet::new()),
            events,
        }
    }

    /// The backing key/value store.
    #[must_use]
    pub fn backend(&self) -> &S {
        &self.store
    }

    /// Configured categories.
    #[must_use]
    pub fn categories(&self) -> &[CategoryConfig] {
        &self.categories
    }

    /// Persistence key of a category.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCategory`] for unconfigured categories.
    pub fn key(&self, category: &str) -> Result<String> {
        self.category(category)
            .map(|c| storage_key(&self.namespace, &c.name))
    }

    /// Read the list for a category.
    ///
    /// Missing or corrupt data reads as an empty list.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown categories or backend failures.
    pub fn read(&self, category: &str) -> Result<Vec<String>> {
        let config = self.category(category)?;
        let key = storage_key(&self.namespace, &config.name);
        self.migrate_legacy(config, &key)?;
        self.read_key(&key)
    }

    /// Replace the list for a category and notify listeners.
    ///
    /// Returns the list as persisted, without duplicates.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown categories or backend failures.
    pub fn write<I, T>(&self, category: &str, ids: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let key = self.key(category)?;
        let ids = dedup(ids.into_iter().map(Into::into));

        self.store.set(&key, &encode_list(&ids))?;
        debug!(category, count = ids.len(), "Wrote compare list");
        self.notify(category, ids.clone());
        Ok(ids)
    }

    /// Remove the list for a category and notify listeners with no ids.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown categories or backend failures.
    pub fn clear(&self, category: &str) -> Result<()> {
        let key = self.key(category)?;
        self.store.remove(&key)?;
        debug!(category, "Cleared compare list");
        self.notify(category, Vec::new());
        Ok(())
    }

    /// Add `id` if absent, remove it if present.
    ///
    /// Returns true when `id` is in the list afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown categories or backend failures.
    pub fn toggle(&self, category: &str, id: &str) -> Result<bool> {
        let mut ids = self.read(category)?;
        let included = if let Some(pos) = ids.iter().position(|existing| existing == id) {
            ids.remove(pos);
            false
        } else {
            ids.push(id.to_string());
            true
        };
        self.write(category, ids)?;
        Ok(included)
    }

    /// Add `id`. Returns false when it was already present.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown categories or backend failures.
    pub fn add(&self, category: &str, id: &str) -> Result<bool> {
        let mut ids = self.read(category)?;
        if ids.iter().any(|existing| existing == id) {
            return Ok(false);
        }
        ids.push(id.to_string());
        self.write(category, ids)?;
        Ok(true)
    }

    /// Remove `id`. Absent ids are a no-op and return false.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown categories or backend failures.
    pub fn remove(&self, category: &str, id: &str) -> Result<bool> {
        let ids = self.read(category)?;
        if !ids.iter().any(|existing| existing == id) {
            return Ok(false);
        }
        self.write(category, ids.into_iter().filter(|existing| existing != id))?;
        Ok(true)
    }

    /// Whether `id` is in the list.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown categories or backend failures.
    pub fn contains(&self, category: &str, id: &str) -> Result<bool> {
        Ok(self.read(category)?.iter().any(|existing| existing == id))
    }

    /// Receive change notifications for one category.
    #[must_use]
    pub fn subscribe(&self, category: &str) -> CompareSubscription {
        CompareSubscription {
            category: category.to_string(),
            rx: self.events.subscribe(),
        }
    }

    /// The channel both signal paths publish on.
    ///
    /// Hand this to a [`StorageWatcher`](super::StorageWatcher) so its
    /// events reach the same subscribers.
    #[must_use]
    pub fn sender(&self) -> broadcast::Sender<CompareEvent> {
        self.events.clone()
    }

    fn category(&self, name: &str) -> Result<&CategoryConfig> {
        self.categories
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::UnknownCategory(name.to_string()))
    }

    fn read_key(&self, key: &str) -> Result<Vec<String>> {
        Ok(self
            .store
            .get(key)?
            .map(|raw| parse_list(&raw))
            .unwrap_or_default())
    }

    fn notify(&self, category: &str, ids: Vec<String>) {
        // No receivers is fine.
        let _ = self.events.send(CompareEvent {
            category: category.to_string(),
            ids,
            origin: EventOrigin::Local,
        });
    }

    fn migrate_legacy(&self, config: &CategoryConfig, key: &str) -> Result<()> {
        if self.is_migrated(&config.name) {
            return Ok(());
        }

        let mut found = Vec::new();
        let mut collected = Vec::new();
        for legacy in config.legacy_keys.iter().filter(|legacy| *legacy != key) {
            if let Some(raw) = self.store.get(legacy)? {
                collected.extend(parse_list(&raw));
                found.push(legacy);
            }
        }

        if !collected.is_empty() {
            let existing = self.read_key(key)?;
            let before = existing.len();
            let merged = dedup(existing.into_iter().chain(collected));
            self.store.set(key, &encode_list(&merged))?;
            info!(
                category = %config.name,
                added = merged.len() - before,
                "Migrated legacy compare list"
            );
        }

        // Only drop legacy keys once their ids are safely in the new key.
        for legacy in found {
            if let Err(e) = self.store.remove(legacy) {
                warn!(key = %legacy, error = %e, "Failed to remove legacy compare key");
            }
        }

        self.migrated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(config.name.clone());
        Ok(())
    }

    fn is_migrated(&self, category: &str) -> bool {
        self.migrated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(category)
    }
}

/// Change notifications for a single category.
///
/// Events for other categories are skipped.
#[derive(Debug)]
pub struct CompareSubscription {
    category: String,
    rx: broadcast::Receiver<CompareEvent>,
}

impl CompareSubscription {
    /// The category this subscription follows.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Wait for the next change.
    ///
    /// Returns `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<CompareEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.category == self.category => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(category = %self.category, skipped, "Compare subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next pending change without waiting.
    pub fn try_recv(&mut self) -> Option<CompareEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if event.category == self.category => return Some(event),
                Ok(_) => {}
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(category = %self.category, skipped, "Compare subscriber lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, Storage};

    const CONTROLLER_KEY: &str = "fcbase:compare:controller";
    const LEGACY_KEY: &str = "fcbase:compare";

    fn store() -> CompareStore<MemoryStore> {
        CompareStore::new(MemoryStore::new(), &CompareConfig::default())
    }

    #[test]
    fn test_read_missing_is_empty() {
        let store = store();
        assert!(store.read("controller").unwrap().is_empty());
    }

    #[test]
    fn test_write_deduplicates() {
        let store = store();
        let written = store.write("controller", ["a", "b", "a"]).unwrap();

        assert_eq!(written, vec!["a", "b"]);
        assert_eq!(store.read("controller").unwrap(), vec!["a", "b"]);
        assert_eq!(
            store.backend().get(CONTROLLER_KEY).unwrap().as_deref(),
            Some(r#"["a","b"]"#)
        );
    }

    #[test]
    fn test_corrupt_data_reads_empty() {
        let store = store();
        store.backend().set(CONTROLLER_KEY, "{not json").unwrap();

        assert!(store.read("controller").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_category() {
        let store = store();
        let err = store.read("receiver").unwrap_err();
        assert!(matches!(err, Error::UnknownCategory(ref c) if c == "receiver"));
        assert!(store.write("receiver", ["a"]).is_err());
    }

    #[test]
    fn test_legacy_migration_merges_and_deletes() {
        let store = store();
        store.backend().set(CONTROLLER_KEY, r#"["a","b"]"#).unwrap();
        store.backend().set(LEGACY_KEY, r#"["b","x"]"#).unwrap();

        assert_eq!(store.read("controller").unwrap(), vec!["a", "b", "x"]);
        assert!(store.backend().get(LEGACY_KEY).unwrap().is_none());
    }

    #[test]
    fn test_legacy_migration_runs_once_per_session() {
        let backend = MemoryStore::new();
        backend.set(LEGACY_KEY, r#"["x"]"#).unwrap();

        let store = CompareStore::new(backend.clone(), &CompareConfig::default());
        assert_eq!(store.read("controller").unwrap(), vec!["x"]);
        assert_eq!(store.read("controller").unwrap(), vec!["x"]);

        // Seeded after this session migrated: left alone.
        backend.set(LEGACY_KEY, r#"["y"]"#).unwrap();
        assert_eq!(store.read("controller").unwrap(), vec!["x"]);
        assert!(backend.get(LEGACY_KEY).unwrap().is_some());

        // A new session picks it up.
        let next = CompareStore::new(backend.clone(), &CompareConfig::default());
        assert_eq!(next.read("controller").unwrap(), vec!["x", "y"]);
        assert!(backend.get(LEGACY_KEY).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_legacy_key_is_dropped() {
        let store = store();
        store.backend().set(LEGACY_KEY, "garbage").unwrap();

        assert!(store.read("controller").unwrap().is_empty());
        assert!(store.backend().get(LEGACY_KEY).unwrap().is_none());
        assert!(store.backend().get(CONTROLLER_KEY).unwrap().is_none());
    }

    #[test]
    fn test_migration_only_touches_configured_category() {
        let store = store();
        store.backend().set(LEGACY_KEY, r#"["x"]"#).unwrap();

        assert!(store.read("transmitter").unwrap().is_empty());
        assert!(store.backend().get(LEGACY_KEY).unwrap().is_some());
    }

    #[test]
    fn test_toggle() {
        let store = store();

        assert!(store.toggle("controller", "a").unwrap());
        assert!(store.toggle("controller", "b").unwrap());
        assert_eq!(store.read("controller").unwrap(), vec!["a", "b"]);

        assert!(!store.toggle("controller", "a").unwrap());
        assert_eq!(store.read("controller").unwrap(), vec!["b"]);
    }

    #[test]
    fn test_add_contains_remove() {
        let store = store();

        assert!(store.add("transmitter", "tx16s").unwrap());
        assert!(!store.add("transmitter", "tx16s").unwrap());
        assert!(store.contains("transmitter", "tx16s").unwrap());

        assert!(store.remove("transmitter", "tx16s").unwrap());
        assert!(!store.contains("transmitter", "tx16s").unwrap());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let store = store();
        store.write("controller", ["a"]).unwrap();
        let mut sub = store.subscribe("controller");

        assert!(!store.remove("controller", "zzz").unwrap());
        assert!(sub.try_recv().is_none());
        assert_eq!(store.read("controller").unwrap(), vec!["a"]);
    }

    #[test]
    fn test_clear_removes_and_notifies() {
        let store = store();
        store.write("controller", ["a"]).unwrap();
        let mut sub = store.subscribe("controller");

        store.clear("controller").unwrap();

        assert!(store.backend().get(CONTROLLER_KEY).unwrap().is_none());
        let event = sub.try_recv().unwrap();
        assert!(event.ids.is_empty());
        assert_eq!(event.origin, EventOrigin::Local);
    }

    #[test]
    fn test_subscription_filters_by_category() {
        let store = store();
        let mut controllers = store.subscribe("controller");

        store.write("transmitter", ["tx16s"]).unwrap();
        store.write("controller", ["a", "a"]).unwrap();

        let event = controllers.try_recv().unwrap();
        assert_eq!(event.category, "controller");
        assert_eq!(event.ids, vec!["a"]);
        assert!(controllers.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_subscription_recv() {
        let store = store();
        let mut sub = store.subscribe("controller");

        store.toggle("controller", "a").unwrap();

        let event = sub.recv().await.unwrap();
        assert_eq!(event.ids, vec!["a"]);
    }

    #[test]
    fn test_stores_sharing_backend_see_each_other() {
        let backend = MemoryStore::new();
        let first = CompareStore::new(backend.clone(), &CompareConfig::default());
        let second = CompareStore::new(backend, &CompareConfig::default());

        first.toggle("controller", "a").unwrap();
        assert_eq!(second.read("controller").unwrap(), vec!["a"]);
    }

    #[test]
    fn test_sqlite_backend() {
        let store = CompareStore::new(
            Storage::open_in_memory().unwrap(),
            &CompareConfig::default(),
        );

        store.write("controller", ["a", "b", "a"]).unwrap();
        assert_eq!(store.read("controller").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_custom_namespace() {
        let store = CompareStore::with_categories(
            MemoryStore::new(),
            "demo",
            vec![CategoryConfig::new("controller")],
        );

        assert_eq!(store.key("controller").unwrap(), "demo:compare:controller");
        assert!(store.key("transmitter").is_err());
    }
}
