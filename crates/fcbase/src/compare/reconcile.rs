//! Pruning compare lists against the loaded catalog.

use std::collections::HashSet;

use tracing::info;

use super::CompareStore;
use crate::error::Result;
use crate::storage::KeyValueStore;

/// Outcome of [`reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciled {
    /// Ids still present in the catalog, in list order.
    pub kept: Vec<String>,
    /// Ids dropped because the catalog no longer has them.
    pub pruned: Vec<String>,
}

/// Drop ids the catalog doesn't know and write the result back.
///
/// Nothing is written when every id is known.
///
/// # Errors
///
/// Returns an error for unknown categories or backend failures.
pub fn reconcile<S, I, T>(store: &CompareStore<S>, category: &str, known_ids: I) -> Result<Reconciled>
where
    S: KeyValueStore,
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let known: HashSet<String> = known_ids
        .into_iter()
        .map(|id| id.as_ref().to_string())
        .collect();

    let (kept, pruned): (Vec<String>, Vec<String>) = store
        .read(category)?
        .into_iter()
        .partition(|id| known.contains(id));

    if !pruned.is_empty() {
        info!(category, pruned = ?pruned, "Pruning unknown ids from compare list");
        store.write(category, kept.iter().cloned())?;
    }

    Ok(Reconciled { kept, pruned })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompareConfig;
    use crate::storage::MemoryStore;

    fn store() -> CompareStore<MemoryStore> {
        CompareStore::new(MemoryStore::new(), &CompareConfig::default())
    }

    #[test]
    fn test_prunes_dangling_ids() {
        let store = store();
        store.write("controller", ["a", "gone", "b"]).unwrap();

        let result = reconcile(&store, "controller", ["a", "b", "c"]).unwrap();

        assert_eq!(result.kept, vec!["a", "b"]);
        assert_eq!(result.pruned, vec!["gone"]);
        assert_eq!(store.read("controller").unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_no_write_when_all_known() {
        let store = store();
        store.write("controller", ["a"]).unwrap();
        let mut sub = store.subscribe("controller");

        let result = reconcile(&store, "controller", vec!["a".to_string()]).unwrap();

        assert!(result.pruned.is_empty());
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_write_back_notifies() {
        let store = store();
        store.write("transmitter", ["gone"]).unwrap();
        let mut sub = store.subscribe("transmitter");

        reconcile(&store, "transmitter", Vec::<String>::new()).unwrap();

        let event = sub.try_recv().unwrap();
        assert!(event.ids.is_empty());
    }
}
