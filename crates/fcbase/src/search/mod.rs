//! Controller search: flattened records, facets, the index and its client.
//!
//! Records are exported at build time to a JSON bundle. A [`SearchIndex`]
//! answers text queries over that bundle and a [`SearchClient`] layers the
//! listing's behavior on top: degraded show-all mode when the index is
//! missing, last-good results on query failure, and discarding results of
//! searches that a newer one superseded. [`SearchDriver`] debounces text
//! input in front of a client.

mod client;
pub mod facets;
mod index;
pub mod record;

pub use client::{
    ClientSnapshot, ClientStatus, SearchClient, SearchDriver, SearchEvent, SearchOutcome,
    SearchTicket, DEGRADED_MESSAGE, QUERY_ERROR_MESSAGE,
};
pub use facets::{count_facets, Facet, FacetCounts, FacetFilters};
pub use index::{tokenize, LocalIndex, SearchIndex};
pub use record::{build_records, export, load_bundle, SearchRecord};
