//! Polling watcher for compare lists changed by other processes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, trace, warn};

use super::{encode_list, parse_list, storage_key, CompareEvent, EventOrigin};
use crate::config::CompareConfig;
use crate::error::Result;
use crate::storage::KeyValueStore;

/// Watches compare list keys for writes made outside this process.
///
/// Each poll reads every category key, normalizes it to a list and compares
/// its digest with the last one seen. Missing keys, `[]` and corrupt values
/// all normalize to the empty list, so clearing and writing an empty list
/// look the same.
#[derive(Debug)]
pub struct StorageWatcher<S> {
    store: S,
    watched: Vec<Watched>,
    interval: Duration,
    last_hash: HashMap<String, blake3::Hash>,
    pending: HashMap<String, Vec<blake3::Hash>>,
}

#[derive(Debug, Clone)]
struct Watched {
    category: String,
    key: String,
}

impl<S: KeyValueStore> StorageWatcher<S> {
    /// Watch every configured category.
    #[must_use]
    pub fn new(store: S, config: &CompareConfig) -> Self {
        Self {
            store,
            watched: config
                .categories
                .iter()
                .map(|c| Watched {
                    category: c.name.clone(),
                    key: storage_key(&config.namespace, &c.name),
                })
                .collect(),
            interval: Duration::from_millis(config.watch_interval_ms),
            last_hash: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    /// Override the poll interval.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// The poll interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Record the current state of every key without reporting it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn prime(&mut self) -> Result<()> {
        let lists = self.read_all()?;
        for (watched, ids) in self.watched.iter().zip(lists) {
            self.last_hash.insert(watched.category.clone(), digest(&ids));
        }
        self.pending.clear();
        Ok(())
    }

    /// Check every key once and report the lists that changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn poll(&mut self) -> Result<Vec<CompareEvent>> {
        let lists = self.read_all()?;
        Ok(self.settle(lists))
    }

    /// Poll, then drain `local` before deciding what changed.
    ///
    /// Draining after the read catches local writes that land while the
    /// keys are being read. If the receiver lagged, local writes went
    /// unseen and the round's changes only move the baseline.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub fn sync(
        &mut self,
        local: &mut broadcast::Receiver<CompareEvent>,
    ) -> Result<Vec<CompareEvent>> {
        let lists = self.read_all()?;

        let mut lagged = false;
        loop {
            match local.try_recv() {
                Ok(event) => self.observe(&event),
                Err(TryRecvError::Lagged(missed)) => {
                    debug!(missed, "Compare watcher missed local events");
                    lagged = true;
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }

        let changes = self.settle(lists);
        if lagged {
            return Ok(Vec::new());
        }
        Ok(changes)
    }

    /// Note a local write so the matching storage change isn't reported.
    pub fn observe(&mut self, event: &CompareEvent) {
        if event.origin == EventOrigin::Local {
            self.pending
                .entry(event.category.clone())
                .or_default()
                .push(digest(&event.ids));
        }
    }

    fn read_all(&self) -> Result<Vec<Vec<String>>> {
        self.watched
            .iter()
            .map(|w| read_ids(&self.store, &w.key))
            .collect()
    }

    fn settle(&mut self, lists: Vec<Vec<String>>) -> Vec<CompareEvent> {
        let mut changed = Vec::new();

        for (watched, ids) in self.watched.iter().zip(lists) {
            let hash = digest(&ids);

            if self.last_hash.get(&watched.category) == Some(&hash) {
                trace!(category = %watched.category, "Compare list unchanged");
                continue;
            }
            self.last_hash.insert(watched.category.clone(), hash);

            let own = self
                .pending
                .remove(&watched.category)
                .is_some_and(|seen| seen.contains(&hash));
            if own {
                trace!(category = %watched.category, "Compare list change was local");
                continue;
            }

            debug!(
                category = %watched.category,
                hash = %hash.to_hex(),
                count = ids.len(),
                "Compare list changed in storage"
            );
            changed.push(CompareEvent {
                category: watched.category.clone(),
                ids,
                origin: EventOrigin::Storage,
            });
        }

        changed
    }
}

impl<S: KeyValueStore + Send + 'static> StorageWatcher<S> {
    /// Poll in the background, publishing changes on `events`.
    ///
    /// Local events seen on the same channel are matched against each poll,
    /// so this process's own writes aren't echoed back.
    #[must_use]
    pub fn spawn(mut self, events: broadcast::Sender<CompareEvent>) -> WatcherHandle {
        if let Err(e) = self.prime() {
            warn!(error = %e, "Failed to read initial compare lists");
        }

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let mut local = events.subscribe();

        debug!(
            interval_ms = self.interval.as_millis(),
            categories = self.watched.len(),
            "Starting compare list watcher"
        );

        let task = tokio::spawn(async move {
            let mut ticker = interval(self.interval);

            while flag.load(Ordering::SeqCst) {
                ticker.tick().await;

                match self.sync(&mut local) {
                    Ok(changes) => {
                        for event in changes {
                            // Our own subscription keeps the channel open.
                            let _ = events.send(event);
                        }
                    }
                    Err(e) => warn!(error = %e, "Error polling compare lists"),
                }
            }

            debug!("Compare list watcher stopped");
        });

        WatcherHandle { running, task }
    }
}

/// Control handle for a spawned [`StorageWatcher`].
#[derive(Debug)]
pub struct WatcherHandle {
    running: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl WatcherHandle {
    /// Ask the watcher to stop after its current poll.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the watcher has been asked to stop.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.task.is_finished()
    }

    /// Stop the watcher and wait for its task to end.
    pub async fn shutdown(self) {
        self.stop();
        self.task.abort();
        let _ = self.task.await;
    }
}

fn read_ids<S: KeyValueStore>(store: &S, key: &str) -> Result<Vec<String>> {
    Ok(store
        .get(key)?
        .map(|raw| parse_list(&raw))
        .unwrap_or_default())
}

fn digest(ids: &[String]) -> blake3::Hash {
    blake3::hash(encode_list(ids).as_bytes())
}
