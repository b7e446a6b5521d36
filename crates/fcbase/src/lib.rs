//! `fcbase` - Flight controller catalog: revision variants, compare lists
//! and faceted search.
//!
//! This library provides the catalog model and its validation, the revision
//! merge engine, persisted compare lists with change notifications, the
//! search index client, and the listing filter state that drives it.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod catalog;
pub mod cli;
pub mod compare;
pub mod config;
pub mod error;
pub mod listing;
pub mod logging;
pub mod revision;
pub mod search;
pub mod storage;

pub use catalog::{Catalog, Controller, Validator};
pub use compare::{CompareEvent, CompareStore, StorageWatcher, COMPARE_CHANGE_EVENT};
pub use config::Config;
pub use error::{Error, Result};
pub use listing::{FilterController, FilterState, ListingView};
pub use logging::init_logging;
pub use revision::{build_variants, merge_revision, RevisionVariant};
pub use search::{FacetFilters, LocalIndex, SearchClient, SearchIndex, SearchRecord};
pub use storage::{KeyValueStore, MemoryStore, Storage, StorageStats};
