//! Search index abstraction and the in-process index over the JSON bundle.

use std::cmp::Reverse;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use tracing::{debug, info};

use super::facets::{count_facets, FacetCounts, FacetFilters};
use super::record::{sort_by_title, SearchRecord};
use crate::error::{Error, Result};

/// A prebuilt search index.
///
/// Implementations must be safe to share between tasks; a client may have
/// several queries in flight against one index.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Load the index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexUnavailable`] when the index can't be loaded.
    async fn init(&self) -> Result<()>;

    /// Run a text query narrowed by facet filters.
    ///
    /// An empty query returns every record that passes the filters.
    ///
    /// # Errors
    ///
    /// Returns an error if the query can't be executed.
    async fn search(&self, query: &str, filters: &FacetFilters) -> Result<Vec<SearchRecord>>;

    /// Facet value counts over the whole index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index isn't loaded.
    async fn filters(&self) -> Result<FacetCounts>;
}

/// Index over the flattened JSON bundle, held in memory.
#[derive(Debug)]
pub struct LocalIndex {
    source: Option<PathBuf>,
    entries: OnceLock<Vec<Indexed>>,
}

#[derive(Debug)]
struct Indexed {
    record: SearchRecord,
    title_words: Vec<String>,
    words: Vec<String>,
}

impl LocalIndex {
    /// An index loaded from `path` on [`init`](SearchIndex::init).
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(path.into()),
            entries: OnceLock::new(),
        }
    }

    /// An index over records already in memory.
    #[must_use]
    pub fn from_records(records: Vec<SearchRecord>) -> Self {
        let entries = OnceLock::new();
        let _ = entries.set(records.into_iter().map(Indexed::new).collect());
        Self {
            source: None,
            entries,
        }
    }

    /// Where the bundle is read from, if anywhere.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Number of indexed records, zero until loaded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.get().map_or(0, Vec::len)
    }

    /// Whether nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn loaded(&self) -> Result<&[Indexed]> {
        self.entries
            .get()
            .map(Vec::as_slice)
            .ok_or_else(|| Error::index_unavailable("search index has not been initialized"))
    }
}

#[async_trait]
impl SearchIndex for LocalIndex {
    async fn init(&self) -> Result<()> {
        if self.entries.get().is_some() {
            return Ok(());
        }
        let Some(path) = self.source.as_deref() else {
            return Err(Error::index_unavailable("no search bundle configured"));
        };

        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::index_unavailable(format!("{}: {e}", path.display()))
        })?;
        let records: Vec<SearchRecord> = serde_json::from_str(&raw).map_err(|e| {
            Error::index_unavailable(format!("{}: {e}", path.display()))
        })?;

        info!(path = %path.display(), count = records.len(), "Loaded search index");
        // A concurrent init may have won; either copy is the same bundle.
        let _ = self
            .entries
            .set(records.into_iter().map(Indexed::new).collect());
        Ok(())
    }

    async fn search(&self, query: &str, filters: &FacetFilters) -> Result<Vec<SearchRecord>> {
        let entries = self.loaded()?;
        let tokens = tokenize(query);

        let candidates = entries.iter().filter(|e| filters.matches(&e.record));

        if tokens.is_empty() {
            let mut results: Vec<SearchRecord> =
                candidates.map(|e| e.record.clone()).collect();
            sort_by_title(&mut results);
            return Ok(results);
        }

        let mut scored: Vec<(u32, &Indexed)> = candidates
            .filter_map(|e| e.score(&tokens).map(|score| (score, e)))
            .collect();
        scored.sort_by_key(|(score, e)| (Reverse(*score), e.record.title.to_lowercase()));

        debug!(query, tokens = tokens.len(), hits = scored.len(), "Searched local index");
        Ok(scored.into_iter().map(|(_, e)| e.record.clone()).collect())
    }

    async fn filters(&self) -> Result<FacetCounts> {
        Ok(count_facets(self.loaded()?.iter().map(|e| &e.record)))
    }
}

impl Indexed {
    fn new(record: SearchRecord) -> Self {
        let title_words = tokenize(&record.title);

        let mut words = title_words.clone();
        for field in [
            &record.brand_name,
            &record.model,
            &record.summary,
            &record.notes,
            &record.mcu_name,
            &record.mcu_family,
        ] {
            words.extend(tokenize(field));
        }
        for value in record.keywords.iter().chain(&record.features) {
            words.extend(tokenize(value));
        }
        words.sort();
        words.dedup();

        Self {
            record,
            title_words,
            words,
        }
    }

    /// Score a query, or `None` when some token matches nothing.
    fn score(&self, tokens: &[String]) -> Option<u32> {
        tokens.iter().try_fold(0, |total, token| {
            if self.title_words.iter().any(|w| w.starts_with(token.as_str())) {
                Some(total + 3)
            } else if self.words.iter().any(|w| w.starts_with(token.as_str())) {
                Some(total + 1)
            } else {
                None
            }
        })
    }
}

/// Split text into lowercase alphanumeric words.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}
