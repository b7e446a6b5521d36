//! Search client: degraded mode, stale result discard and debounced input.

use std::future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, trace, warn};

use super::facets::{count_facets, FacetCounts, FacetFilters};
use super::index::SearchIndex;
use super::record::SearchRecord;
use crate::config::Config;
use crate::error::{Error, Result};

/// Banner shown while the index is unavailable.
pub const DEGRADED_MESSAGE: &str = "Search is temporarily unavailable.";

/// Error shown when a query fails after the index loaded.
pub const QUERY_ERROR_MESSAGE: &str = "Unable to run search right now.";

/// Index state as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientStatus {
    /// Not initialized yet.
    Loading,
    /// Index loaded; queries and filters apply.
    Ready,
    /// Index failed to load; every query shows the full dataset.
    Degraded {
        /// Informational message for the user.
        message: String,
    },
}

impl ClientStatus {
    /// Whether searches pass through to the full dataset.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Result of a search call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The search was the latest one and its results are now current.
    Committed(Vec<SearchRecord>),
    /// A newer search started first; these results were discarded.
    Superseded,
}

/// Point-in-time view of the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSnapshot {
    /// Index state.
    pub status: ClientStatus,
    /// Last committed results.
    pub results: Vec<SearchRecord>,
    /// Dismissible query error.
    pub error: Option<String>,
    /// A search is in flight.
    pub searching: bool,
    /// At least one search has committed.
    pub has_results: bool,
}

/// Identifies one search so late results can be recognised as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTicket(u64);

/// Wraps a [`SearchIndex`] with the listing's failure semantics.
///
/// Only the most recently started search may commit results. If the index
/// can't be loaded the client degrades and every search returns the full
/// dataset unfiltered. A failing query records an error and keeps the last
/// good results.
#[derive(Debug)]
pub struct SearchClient<I> {
    index: Arc<I>,
    dataset: Vec<SearchRecord>,
    state: Mutex<ClientState>,
    generation: AtomicU64,
}

#[derive(Debug)]
struct ClientState {
    status: ClientStatus,
    results: Vec<SearchRecord>,
    error: Option<String>,
    searching: bool,
    has_results: bool,
}

impl<I: SearchIndex> SearchClient<I> {
    /// Create a client. `dataset` is what degraded mode shows.
    #[must_use]
    pub fn new(index: I, dataset: Vec<SearchRecord>) -> Self {
        Self::with_shared(Arc::new(index), dataset)
    }

    /// Create a client over an index shared with other owners.
    #[must_use]
    pub fn with_shared(index: Arc<I>, dataset: Vec<SearchRecord>) -> Self {
        Self {
            index,
            dataset,
            state: Mutex::new(ClientState {
                status: ClientStatus::Loading,
                results: Vec::new(),
                error: None,
                searching: false,
                has_results: false,
            }),
            generation: AtomicU64::new(0),
        }
    }

    /// The wrapped index.
    #[must_use]
    pub fn index(&self) -> &Arc<I> {
        &self.index
    }

    /// The full dataset.
    #[must_use]
    pub fn dataset(&self) -> &[SearchRecord] {
        &self.dataset
    }

    /// Load the index, degrading on failure.
    pub async fn initialize(&self) -> ClientStatus {
        let status = match self.index.init().await {
            Ok(()) => {
                info!("Search index ready");
                ClientStatus::Ready
            }
            Err(e) => {
                warn!(error = %e, "Search index unavailable, showing all items");
                ClientStatus::Degraded {
                    message: DEGRADED_MESSAGE.to_string(),
                }
            }
        };

        let mut state = self.lock();
        state.status = status.clone();
        if status.is_degraded() {
            state.results = self.dataset.clone();
            state.has_results = true;
        }
        status
    }

    /// Current index state.
    #[must_use]
    pub fn status(&self) -> ClientStatus {
        self.lock().status.clone()
    }

    /// Copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> ClientSnapshot {
        let state = self.lock();
        ClientSnapshot {
            status: state.status.clone(),
            results: state.results.clone(),
            error: state.error.clone(),
            searching: state.searching,
            has_results: state.has_results,
        }
    }

    /// Clear the query error.
    pub fn dismiss_error(&self) {
        self.lock().error = None;
    }

    /// Run a search, committing its results if it is still the latest.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QueryFailed`] when the latest query fails. The
    /// previous results stay current.
    pub async fn search(&self, query: &str, filters: &FacetFilters) -> Result<SearchOutcome> {
        let ticket = self.begin();
        self.execute(ticket, query, filters).await
    }

    /// Claim the next search slot, superseding any search in flight.
    pub fn begin(&self) -> SearchTicket {
        SearchTicket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether `ticket` belongs to the most recent search.
    #[must_use]
    pub fn is_current(&self, ticket: SearchTicket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.0
    }

    /// Run the search claimed by `ticket`.
    ///
    /// # Errors
    ///
    /// See [`search`](Self::search).
    pub async fn execute(
        &self,
        ticket: SearchTicket,
        query: &str,
        filters: &FacetFilters,
    ) -> Result<SearchOutcome> {
        if self.status() == ClientStatus::Loading {
            self.initialize().await;
        }

        if self.status().is_degraded() {
            if !self.is_current(ticket) {
                return Ok(SearchOutcome::Superseded);
            }
            let mut state = self.lock();
            state.results = self.dataset.clone();
            state.has_results = true;
            state.searching = false;
            return Ok(SearchOutcome::Committed(state.results.clone()));
        }

        {
            let mut state = self.lock();
            if !self.is_current(ticket) {
                return Ok(SearchOutcome::Superseded);
            }
            state.searching = true;
        }
        let result = self.index.search(query, filters).await;

        let mut state = self.lock();
        if !self.is_current(ticket) {
            trace!(query, "Discarding superseded search results");
            return Ok(SearchOutcome::Superseded);
        }
        state.searching = false;
        match result {
            Ok(results) => {
                debug!(query, count = results.len(), "Search committed");
                state.results.clone_from(&results);
                state.error = None;
                state.has_results = true;
                Ok(SearchOutcome::Committed(results))
            }
            Err(e) => {
                warn!(query, error = %e, "Search query failed");
                state.error = Some(QUERY_ERROR_MESSAGE.to_string());
                Err(Error::query_failed(e.to_string()))
            }
        }
    }

    /// Facet value counts for the filter UI.
    ///
    /// Falls back to counting the full dataset when degraded or when the
    /// index can't answer.
    pub async fn filters(&self) -> FacetCounts {
        if !self.status().is_degraded() {
            match self.index.filters().await {
                Ok(counts) => return counts,
                Err(e) => warn!(error = %e, "Failed to read facet counts from index"),
            }
        }
        count_facets(&self.dataset)
    }

    fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Something a [`SearchDriver`] search produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    /// Results of the latest search.
    Results {
        /// Query text that produced them.
        query: String,
        /// The committed records.
        records: Vec<SearchRecord>,
    },
    /// The latest search failed; earlier results still stand.
    Failed {
        /// User-facing message.
        message: String,
    },
}

#[derive(Debug)]
enum Command {
    Text(String),
    Filters(FacetFilters),
    Flush,
}

/// Feeds input changes to a [`SearchClient`].
///
/// Text changes are debounced: each one restarts the timer and only the
/// text present when it fires is searched. Filter changes search at once
/// with the last debounced text. Every search runs in its own task, so a
/// slow query never blocks a newer one.
#[derive(Debug)]
pub struct SearchDriver {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl SearchDriver {
    /// Start a driver. Results arrive on the returned receiver.
    #[must_use]
    pub fn spawn<I>(
        client: Arc<SearchClient<I>>,
        debounce: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<SearchEvent>)
    where
        I: SearchIndex + 'static,
    {
        let (commands, mut rx) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            let mut pending = String::new();
            let mut text = String::new();
            let mut filters = FacetFilters::new();
            let mut deadline: Option<Instant> = None;

            loop {
                let wait = deadline;
                let timer = async move {
                    match wait {
                        Some(at) => sleep_until(at).await,
                        None => future::pending().await,
                    }
                };

                let fire = tokio::select! {
                    command = rx.recv() => match command {
                        None => break,
                        Some(Command::Text(value)) => {
                            pending = value;
                            deadline = Some(Instant::now() + debounce);
                            false
                        }
                        Some(Command::Filters(value)) => {
                            filters = value;
                            true
                        }
                        Some(Command::Flush) => {
                            if deadline.take().is_some() {
                                text.clone_from(&pending);
                            }
                            true
                        }
                    },
                    () = timer => {
                        deadline = None;
                        text.clone_from(&pending);
                        true
                    }
                };

                if fire {
                    run(&client, &events, text.clone(), filters.clone());
                }
            }

            debug!("Search driver stopped");
        });

        (Self { commands, task }, events_rx)
    }

    /// Start a driver with the debounce from `search.debounce_ms`.
    #[must_use]
    pub fn from_config<I>(
        client: Arc<SearchClient<I>>,
        config: &Config,
    ) -> (Self, mpsc::UnboundedReceiver<SearchEvent>)
    where
        I: SearchIndex + 'static,
    {
        Self::spawn(client, config.debounce())
    }

    /// Query text changed.
    pub fn set_text(&self, text: impl Into<String>) {
        let _ = self.commands.send(Command::Text(text.into()));
    }

    /// Facet selections changed.
    pub fn set_filters(&self, filters: FacetFilters) {
        let _ = self.commands.send(Command::Filters(filters));
    }

    /// Search now with the pending text, skipping the rest of the debounce.
    pub fn flush(&self) {
        let _ = self.commands.send(Command::Flush);
    }

    /// Stop accepting input and wait for the driver task.
    pub async fn shutdown(self) {
        drop(self.commands);
        let _ = self.task.await;
    }
}

fn run<I>(
    client: &Arc<SearchClient<I>>,
    events: &mpsc::UnboundedSender<SearchEvent>,
    query: String,
    filters: FacetFilters,
) where
    I: SearchIndex + 'static,
{
    let ticket = client.begin();
    let client = Arc::clone(client);
    let events = events.clone();

    tokio::spawn(async move {
        let event = match client.execute(ticket, &query, &filters).await {
            Ok(SearchOutcome::Committed(records)) => SearchEvent::Results { query, records },
            Ok(SearchOutcome::Superseded) => return,
            Err(_) => SearchEvent::Failed {
                message: QUERY_ERROR_MESSAGE.to_string(),
            },
        };
        let _ = events.send(event);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::facets::tests::record;
    use crate::search::facets::Facet;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Index that records queries and can be told to stall or fail.
    #[derive(Debug, Default)]
    struct FakeIndex {
        records: Vec<SearchRecord>,
        fail_init: bool,
        calls: AtomicUsize,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SearchIndex for FakeIndex {
        async fn init(&self) -> Result<()> {
            if self.fail_init {
                return Err(Error::index_unavailable("bundle missing"));
            }
            Ok(())
        }

        async fn search(&self, query: &str, filters: &FacetFilters) -> Result<Vec<SearchRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.to_string());

            if query == "boom" {
                return Err(Error::internal("index crashed"));
            }
            if query.starts_with("slow") {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }

            Ok(self
                .records
                .iter()
                .filter(|r| filters.matches(r))
                .filter(|r| query.is_empty() || r.title.contains(query.trim_start_matches("slow ")))
                .cloned()
                .collect())
        }

        async fn filters(&self) -> Result<FacetCounts> {
            Ok(count_facets(&self.records))
        }
    }

    fn items() -> Vec<SearchRecord> {
        let mut out = Vec::new();
        for (id, title, firmware, mounting) in [
            ("1", "alpha", &["stable"][..], "20x20"),
            ("2", "beta", &["beta"][..], "20x20"),
            ("3", "gamma", &["stable", "beta"][..], "30.5x30.5"),
        ] {
            let mut r = record(id, &[(Facet::Firmware, firmware), (Facet::Mounting, &[mounting])]);
            r.title = title.to_string();
            out.push(r);
        }
        out
    }

    fn client(fail_init: bool) -> Arc<SearchClient<FakeIndex>> {
        let index = FakeIndex {
            records: items(),
            fail_init,
            ..FakeIndex::default()
        };
        Arc::new(SearchClient::new(index, items()))
    }

    fn ids(records: &[SearchRecord]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_initialize_ready() {
        let client = client(false);
        assert_eq!(client.status(), ClientStatus::Loading);
        assert_eq!(client.initialize().await, ClientStatus::Ready);
        assert!(!client.snapshot().has_results);
    }

    #[tokio::test]
    async fn test_facets_and_across_or_within() {
        let client = client(false);
        client.initialize().await;

        let filters = FacetFilters::new().with(Facet::Firmware, ["stable", "beta"]);
        let SearchOutcome::Committed(all) = client.search("", &filters).await.unwrap() else {
            panic!("search was superseded");
        };
        assert_eq!(ids(&all), vec!["1", "2", "3"]);

        let filters = filters.with(Facet::Mounting, ["30.5x30.5"]);
        let SearchOutcome::Committed(one) = client.search("", &filters).await.unwrap() else {
            panic!("search was superseded");
        };
        assert_eq!(ids(&one), vec!["3"]);
    }

    #[tokio::test]
    async fn test_degraded_shows_everything() {
        let client = client(true);
        let status = client.initialize().await;
        assert_eq!(
            status,
            ClientStatus::Degraded {
                message: DEGRADED_MESSAGE.to_string()
            }
        );
        assert_eq!(client.snapshot().results.len(), 3);

        let filters = FacetFilters::new().with(Facet::Mounting, ["30.5x30.5"]);
        let outcome = client.search("gamma", &filters).await.unwrap();
        assert_eq!(outcome, SearchOutcome::Committed(items()));
        assert_eq!(client.index().calls.load(Ordering::SeqCst), 0);

        let counts = client.filters().await;
        assert_eq!(counts["mounting"]["20x20"], 2);
    }

    #[tokio::test]
    async fn test_search_initializes_lazily() {
        let client = client(false);
        client.search("alpha", &FacetFilters::new()).await.unwrap();
        assert_eq!(client.status(), ClientStatus::Ready);
    }

    #[tokio::test]
    async fn test_failure_keeps_last_good_results() {
        let client = client(false);
        client.initialize().await;
        client.search("alpha", &FacetFilters::new()).await.unwrap();

        let err = client.search("boom", &FacetFilters::new()).await.unwrap_err();
        assert!(matches!(err, Error::QueryFailed { .. }));

        let snapshot = client.snapshot();
        assert_eq!(ids(&snapshot.results), vec!["1"]);
        assert_eq!(snapshot.error.as_deref(), Some(QUERY_ERROR_MESSAGE));
        assert!(!snapshot.searching);

        client.dismiss_error();
        assert!(client.snapshot().error.is_none());
        assert_eq!(ids(&client.snapshot().results), vec!["1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_results_are_discarded() {
        let client = client(false);
        client.initialize().await;

        let slow_ticket = client.begin();
        let slow = {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .execute(slow_ticket, "slow alpha", &FacetFilters::new())
                    .await
            })
        };
        tokio::task::yield_now().await;

        let SearchOutcome::Committed(fast) = client.search("beta", &FacetFilters::new()).await.unwrap()
        else {
            panic!("fast search was superseded");
        };
        assert_eq!(ids(&fast), vec!["2"]);

        assert_eq!(slow.await.unwrap().unwrap(), SearchOutcome::Superseded);
        assert_eq!(ids(&client.snapshot().results), vec!["2"]);
        assert!(!client.snapshot().searching);
    }

    #[tokio::test]
    async fn test_out_of_order_search_leaves_state_alone() {
        let client = client(false);
        client.initialize().await;

        let older = client.begin();
        let newer = client.begin();
        let outcome = client.execute(newer, "beta", &FacetFilters::new()).await.unwrap();
        assert!(matches!(outcome, SearchOutcome::Committed(_)));

        let outcome = client.execute(older, "alpha", &FacetFilters::new()).await.unwrap();
        assert_eq!(outcome, SearchOutcome::Superseded);
        assert_eq!(client.index().calls.load(Ordering::SeqCst), 1);

        let snapshot = client.snapshot();
        assert!(!snapshot.searching);
        assert_eq!(ids(&snapshot.results), vec!["2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_coalesces_keystrokes() {
        let client = client(false);
        client.initialize().await;
        let (driver, mut events) = SearchDriver::spawn(Arc::clone(&client), Duration::from_millis(300));

        for text in ["g", "ga", "gam", "gamm", "gamma"] {
            driver.set_text(text);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(client.index().calls.load(Ordering::SeqCst), 1);
        assert_eq!(*client.index().queries.lock().unwrap(), vec!["gamma"]);

        let SearchEvent::Results { query, records } = events.recv().await.unwrap() else {
            panic!("expected results");
        };
        assert_eq!(query, "gamma");
        assert_eq!(ids(&records), vec!["3"]);

        driver.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_uses_configured_debounce() {
        let client = client(false);
        client.initialize().await;
        let mut config = Config::default();
        config.search.debounce_ms = 1000;
        let (driver, mut events) = SearchDriver::from_config(Arc::clone(&client), &config);

        driver.set_text("alpha");
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(client.index().calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(client.index().calls.load(Ordering::SeqCst), 1);
        let SearchEvent::Results { query, records } = events.recv().await.unwrap() else {
            panic!("expected results");
        };
        assert_eq!(query, "alpha");
        assert_eq!(ids(&records), vec!["1"]);

        driver.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_filter_change_searches_immediately() {
        let client = client(false);
        client.initialize().await;
        let (driver, mut events) = SearchDriver::spawn(Arc::clone(&client), Duration::from_millis(300));

        driver.set_filters(FacetFilters::new().with(Facet::Firmware, ["beta"]));
        let SearchEvent::Results { query, records } = events.recv().await.unwrap() else {
            panic!("expected results");
        };
        assert!(query.is_empty());
        assert_eq!(ids(&records), vec!["2", "3"]);

        driver.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_driver_search_wins() {
        let client = client(false);
        client.initialize().await;
        let (driver, mut events) = SearchDriver::spawn(Arc::clone(&client), Duration::from_millis(300));

        driver.set_text("slow alpha");
        driver.flush();
        tokio::time::sleep(Duration::from_millis(10)).await;
        driver.set_filters(FacetFilters::new().with(Facet::Mounting, ["30.5x30.5"]));
        tokio::time::sleep(Duration::from_millis(1000)).await;

        let SearchEvent::Results { records, .. } = events.recv().await.unwrap() else {
            panic!("expected results");
        };
        // The slow text search was overtaken by the filter change.
        assert!(records.is_empty());
        assert!(events.try_recv().is_err());
        assert!(client.snapshot().results.is_empty());

        driver.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_reports_failure() {
        let client = client(false);
        client.initialize().await;
        let (driver, mut events) = SearchDriver::spawn(Arc::clone(&client), Duration::from_millis(300));

        driver.set_text("boom");
        driver.flush();

        assert_eq!(
            events.recv().await.unwrap(),
            SearchEvent::Failed {
                message: QUERY_ERROR_MESSAGE.to_string()
            }
        );
        driver.shutdown().await;
    }
}
