//! Listing page state: filter selections, URL sync and pagination.
//!
//! [`FilterState`] round-trips through the listing URL's query string.
//! [`FilterController`] owns the state, resets to the first page whenever
//! the search text or a facet changes, and rewrites the URL once per
//! transition through a [`UrlSink`]. [`ListingView`] turns a client
//! snapshot and the controller into what the page renders.

use std::collections::BTreeMap;
use std::ops::Range;

use serde::Serialize;
use tracing::{debug, trace};
use url::form_urlencoded;

use crate::search::{ClientSnapshot, ClientStatus, Facet, FacetCounts, FacetFilters, SearchRecord};

/// Results per page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 24;

const MCU_PREFIX: &str = "STM32";

/// Search text, facet selections and page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterState {
    /// Free-text query.
    pub search_text: String,
    /// MCU family, e.g. `STM32H7`.
    pub mcu: Option<String>,
    /// Mounting pattern.
    pub mounting: Option<String>,
    /// UART bucket.
    pub uarts: Option<String>,
    /// Lifecycle.
    pub lifecycle: Option<String>,
    /// Only boards with CAN.
    pub can: bool,
    /// Only boards with a MicroSD slot.
    pub sd: bool,
    /// Firmware statuses, any of which may match.
    pub firmware: Vec<String>,
    /// One-based page.
    pub page: usize,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            search_text: String::new(),
            mcu: None,
            mounting: None,
            uarts: None,
            lifecycle: None,
            can: false,
            sd: false,
            firmware: Vec::new(),
            page: 1,
        }
    }
}

impl FilterState {
    /// Parse a URL query string. A leading `?` is ignored.
    ///
    /// Unknown parameters are ignored and malformed values fall back to
    /// "no filter" or page 1.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut state = Self::default();

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            let value = value.trim();
            match key.as_ref() {
                "q" => state.search_text = value.to_string(),
                "mcu" => state.mcu = non_empty(value).map(decode_mcu),
                "mounting" => state.mounting = non_empty(value).map(str::to_string),
                "uarts" => state.uarts = non_empty(value).map(str::to_string),
                "lifecycle" => state.lifecycle = non_empty(value).map(str::to_string),
                "can" => state.can = is_on(value),
                "sd" => state.sd = is_on(value),
                "firmware" => {
                    for status in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                        if !state.firmware.iter().any(|f| f == status) {
                            state.firmware.push(status.to_string());
                        }
                    }
                }
                "page" => state.page = value.parse().ok().filter(|p| *p > 0).unwrap_or(1),
                _ => trace!(key = %key, "Ignoring unknown listing parameter"),
            }
        }

        state
    }

    /// Serialize to a query string without the leading `?`.
    ///
    /// Empty selections are omitted and the page only appears past 1.
    #[must_use]
    pub fn to_query(&self) -> String {
        let mut params = form_urlencoded::Serializer::new(String::new());

        let text = self.search_text.trim();
        if !text.is_empty() {
            params.append_pair("q", text);
        }
        if let Some(mcu) = self.mcu.as_deref() {
            params.append_pair("mcu", &encode_mcu(mcu));
        }
        for (key, value) in [
            ("mounting", &self.mounting),
            ("uarts", &self.uarts),
            ("lifecycle", &self.lifecycle),
        ] {
            if let Some(value) = value {
                params.append_pair(key, value);
            }
        }
        if self.can {
            params.append_pair("can", "1");
        }
        if self.sd {
            params.append_pair("sd", "1");
        }
        if !self.firmware.is_empty() {
            params.append_pair("firmware", &self.firmware.join(","));
        }
        if self.page > 1 {
            params.append_pair("page", &self.page.to_string());
        }

        params.finish()
    }

    /// Facet selections in the form the search index takes.
    #[must_use]
    pub fn facet_filters(&self) -> FacetFilters {
        let mut filters = FacetFilters::new();
        for (facet, value) in [
            (Facet::Mcu, &self.mcu),
            (Facet::Mounting, &self.mounting),
            (Facet::Uarts, &self.uarts),
            (Facet::Lifecycle, &self.lifecycle),
        ] {
            filters.set(facet, value.iter().cloned());
        }
        if self.can {
            filters.set(Facet::Can, ["1"]);
        }
        if self.sd {
            filters.set(Facet::Sd, ["1"]);
        }
        filters.set(Facet::Firmware, self.firmware.iter().cloned());
        filters
    }

    /// Whether any facet is selected.
    #[must_use]
    pub fn has_active_filters(&self) -> bool {
        self.mcu.is_some()
            || self.mounting.is_some()
            || self.uarts.is_some()
            || self.lifecycle.is_some()
            || self.can
            || self.sd
            || !self.firmware.is_empty()
    }

    /// Whether text or any facet is set.
    #[must_use]
    pub fn is_filtered(&self) -> bool {
        !self.search_text.trim().is_empty() || self.has_active_filters()
    }

    fn same_selection(&self, other: &Self) -> bool {
        self.search_text.trim() == other.search_text.trim()
            && self.mcu == other.mcu
            && self.mounting == other.mounting
            && self.uarts == other.uarts
            && self.lifecycle == other.lifecycle
            && self.can == other.can
            && self.sd == other.sd
            && self.firmware == other.firmware
    }
}

/// Shorten an MCU family for the URL: `STM32H7` becomes `H7`.
#[must_use]
pub fn encode_mcu(value: &str) -> String {
    let rest = strip_mcu_prefix(value)
        .map(|rest| {
            rest.chars()
                .take_while(char::is_ascii_alphanumeric)
                .collect::<String>()
        })
        .unwrap_or_default();

    if rest.is_empty() {
        value.to_string()
    } else {
        rest.to_uppercase()
    }
}

/// Expand a URL MCU value: `h7` becomes `STM32H7`.
///
/// `Unknown` is kept as is so the fallback family survives a round trip.
#[must_use]
pub fn decode_mcu(value: &str) -> String {
    if strip_mcu_prefix(value).is_some() {
        value.to_uppercase()
    } else if value.eq_ignore_ascii_case("unknown") {
        "Unknown".to_string()
    } else {
        format!("{MCU_PREFIX}{}", value.to_uppercase())
    }
}

fn strip_mcu_prefix(value: &str) -> Option<&str> {
    let head = value.get(..MCU_PREFIX.len())?;
    head.eq_ignore_ascii_case(MCU_PREFIX)
        .then(|| &value[MCU_PREFIX.len()..])
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

fn is_on(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}

/// Build a listing URL under the site base path.
#[must_use]
pub fn listing_url(base_path: &str, state: &FilterState) -> String {
    let base = base_path.trim_end_matches('/');
    let query = state.to_query();
    if query.is_empty() {
        format!("{base}/controllers/")
    } else {
        format!("{base}/controllers/?{query}")
    }
}

/// Receives URL rewrites.
///
/// Each call replaces the current history entry; it never adds one.
pub trait UrlSink {
    /// Replace the current URL's query string.
    fn replace(&mut self, query: &str);
}

/// A [`UrlSink`] that remembers every rewrite.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlHistory {
    replacements: Vec<String>,
}

impl UrlHistory {
    /// Create an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The query string currently in place.
    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.replacements.last().map(String::as_str)
    }

    /// Every rewrite in order.
    #[must_use]
    pub fn replacements(&self) -> &[String] {
        &self.replacements
    }
}

impl UrlSink for UrlHistory {
    fn replace(&mut self, query: &str) {
        self.replacements.push(query.to_string());
    }
}

/// Owns a listing's [`FilterState`] and keeps the URL in step with it.
///
/// Each change is one transition with one URL rewrite. Changing the text
/// or any facet returns to page 1 and bumps [`query_revision`], the signal
/// to search again. A page taken from the URL at hydration is kept until
/// the result count is known, then clamped.
///
/// [`query_revision`]: FilterController::query_revision
#[derive(Debug)]
pub struct FilterController<U> {
    state: FilterState,
    sink: U,
    page_size: usize,
    total: Option<usize>,
    transitions: u64,
    query_revision: u64,
}

impl<U: UrlSink> FilterController<U> {
    /// Create a controller with an empty selection.
    #[must_use]
    pub fn new(sink: U, page_size: usize) -> Self {
        Self {
            state: FilterState::default(),
            sink,
            page_size: page_size.max(1),
            total: None,
            transitions: 0,
            query_revision: 0,
        }
    }

    /// Load state from the URL query string.
    pub fn hydrate(&mut self, query: &str) {
        self.state = FilterState::from_query(query);
        self.total = None;
        debug!(state = ?self.state, "Hydrated listing state from URL");
        self.query_revision += 1;
        self.commit();
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &FilterState {
        &self.state
    }

    /// The URL sink.
    #[must_use]
    pub fn sink(&self) -> &U {
        &self.sink
    }

    /// Results per page.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of state transitions so far.
    #[must_use]
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Bumped whenever text or facets change and results need refreshing.
    #[must_use]
    pub fn query_revision(&self) -> u64 {
        self.query_revision
    }

    /// Set the search text.
    pub fn set_search_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.update(|state| state.search_text = text);
    }

    /// Replace the selection for one facet.
    ///
    /// Single-valued facets take the first non-empty value; toggles are on
    /// when any value is `1` or `true`.
    pub fn set_facet<I, T>(&mut self, facet: Facet, values: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let values: Vec<String> = values
            .into_iter()
            .map(Into::into)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        let first = values.first().cloned();

        self.update(|state| match facet {
            Facet::Mcu => state.mcu = first,
            Facet::Mounting => state.mounting = first,
            Facet::Uarts => state.uarts = first,
            Facet::Lifecycle => state.lifecycle = first,
            Facet::Can => state.can = values.iter().any(|v| is_on(v)),
            Facet::Sd => state.sd = values.iter().any(|v| is_on(v)),
            Facet::Firmware => {
                state.firmware.clear();
                for value in values {
                    if !state.firmware.contains(&value) {
                        state.firmware.push(value);
                    }
                }
            }
        });
    }

    /// Add or remove one firmware status.
    pub fn toggle_firmware(&mut self, status: &str) {
        let mut firmware = self.state.firmware.clone();
        if let Some(pos) = firmware.iter().position(|f| f == status) {
            firmware.remove(pos);
        } else {
            firmware.push(status.to_string());
        }
        self.set_facet(Facet::Firmware, firmware);
    }

    /// Clear text and every facet in one transition.
    ///
    /// Returns false when there was nothing to clear.
    pub fn reset(&mut self) -> bool {
        let cleared = FilterState::default();
        if self.state.same_selection(&cleared) && self.state.page == 1 {
            return false;
        }
        self.state = cleared;
        self.query_revision += 1;
        self.commit();
        true
    }

    /// Go to a page, clamped to the known range.
    pub fn set_page(&mut self, page: usize) {
        let page = self.clamp(page);
        if page != self.state.page {
            self.state.page = page;
            self.commit();
        }
    }

    /// Go to the next page, if any.
    pub fn next_page(&mut self) {
        self.set_page(self.state.page.saturating_add(1));
    }

    /// Go to the previous page, if any.
    pub fn previous_page(&mut self) {
        self.set_page(self.state.page.saturating_sub(1));
    }

    /// Record the result count and clamp the page to it.
    pub fn set_total(&mut self, total: usize) {
        self.total = Some(total);
        let clamped = self.clamp(self.state.page);
        if clamped != self.state.page {
            debug!(from = self.state.page, to = clamped, total, "Clamping listing page");
            self.state.page = clamped;
            self.commit();
        }
    }

    /// Result count, once known.
    #[must_use]
    pub fn total(&self) -> Option<usize> {
        self.total
    }

    /// Number of pages for the known result count, at least 1.
    #[must_use]
    pub fn total_pages(&self) -> usize {
        total_pages(self.total.unwrap_or(0), self.page_size)
    }

    /// Index range of the current page within `total` results.
    #[must_use]
    pub fn page_range(&self, total: usize) -> Range<usize> {
        let page = self.state.page.clamp(1, total_pages(total, self.page_size));
        let start = (page - 1) * self.page_size;
        start.min(total)..(start + self.page_size).min(total)
    }

    fn clamp(&self, page: usize) -> usize {
        match self.total {
            Some(total) => page.clamp(1, total_pages(total, self.page_size)),
            None => page.max(1),
        }
    }

    fn update(&mut self, change: impl FnOnce(&mut FilterState)) {
        let mut next = self.state.clone();
        change(&mut next);
        if next.same_selection(&self.state) {
            return;
        }
        next.page = 1;
        self.state = next;
        self.query_revision += 1;
        self.commit();
    }

    fn commit(&mut self) {
        self.transitions += 1;
        let query = self.state.to_query();
        trace!(query = %query, "Rewriting listing URL");
        self.sink.replace(&query);
    }
}

/// Number of pages needed for `total` results, at least 1.
#[must_use]
pub fn total_pages(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size.max(1)).max(1)
}

/// A selectable facet value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetOption {
    /// Value as stored in records and the URL.
    pub value: String,
    /// Display label.
    pub label: String,
    /// Matching results.
    pub count: usize,
}

/// Display label for a facet value.
#[must_use]
pub fn facet_label(facet: Facet, value: &str) -> String {
    match facet {
        Facet::Mcu | Facet::Firmware => value.to_uppercase(),
        Facet::Mounting => format_mounting(value),
        Facet::Uarts => match value {
            "0-4" | "5-6" | "7-8" | "9-10" => format!("{} UARTs", value.replace('-', "\u{2013}")),
            "11+" => "11+ UARTs".to_string(),
            other => other.to_string(),
        },
        Facet::Lifecycle => title_case(value),
        Facet::Can | Facet::Sd => match value {
            "1" => "Yes".to_string(),
            "0" => "No".to_string(),
            other => other.to_string(),
        },
    }
}

/// Options for one facet, labelled and sorted by label.
#[must_use]
pub fn facet_options(counts: &FacetCounts, facet: Facet) -> Vec<FacetOption> {
    let mut options: Vec<FacetOption> = counts
        .get(facet.as_str())
        .into_iter()
        .flatten()
        .filter(|(_, count)| **count > 0)
        .map(|(value, count)| FacetOption {
            value: value.clone(),
            label: facet_label(facet, value),
            count: *count,
        })
        .collect();
    options.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.value.cmp(&b.value)));
    options
}

fn format_mounting(value: &str) -> String {
    match value {
        "" | "custom" => "Custom".to_string(),
        "cube" | "wing" => title_case(value),
        other => format!("{} mm", other.replace(['x', 'X'], "\u{d7}")),
    }
}

fn title_case(value: &str) -> String {
    value
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// What the listing page shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ListingStatus {
    /// Waiting for the first results.
    Loading,
    /// A newer search is running; earlier results are still shown.
    Searching,
    /// Results are shown.
    Ready,
    /// Nothing matches.
    Empty,
    /// The index is unavailable; everything is shown unfiltered.
    Degraded {
        /// Informational banner.
        message: String,
    },
}

/// Render-ready state of a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingView {
    /// Page status.
    pub status: ListingStatus,
    /// Dismissible query error.
    pub error: Option<String>,
    /// Records on the current page.
    pub items: Vec<SearchRecord>,
    /// Current page.
    pub page: usize,
    /// Number of pages.
    pub total_pages: usize,
    /// Number of matching records.
    pub total: usize,
    /// Facet options computed from the results.
    pub options: BTreeMap<Facet, Vec<FacetOption>>,
}

impl ListingView {
    /// Build the view from client and controller state.
    ///
    /// Facet options count the current results, or `dataset` when there
    /// are none, so a narrowing choice can always be undone.
    #[must_use]
    pub fn build<U: UrlSink>(
        snapshot: &ClientSnapshot,
        controller: &FilterController<U>,
        dataset: &[SearchRecord],
    ) -> Self {
        let results = &snapshot.results;
        let total = results.len();

        let status = match &snapshot.status {
            ClientStatus::Degraded { message } => ListingStatus::Degraded {
                message: message.clone(),
            },
            ClientStatus::Loading => ListingStatus::Loading,
            ClientStatus::Ready if !snapshot.has_results => ListingStatus::Loading,
            ClientStatus::Ready if snapshot.searching => ListingStatus::Searching,
            ClientStatus::Ready if total == 0 => ListingStatus::Empty,
            ClientStatus::Ready => ListingStatus::Ready,
        };

        let counted = if results.is_empty() { dataset } else { results };
        let counts = crate::search::count_facets(counted);
        let options = Facet::ALL
            .into_iter()
            .map(|facet| (facet, facet_options(&counts, facet)))
            .collect();

        let range = controller.page_range(total);
        let total_pages = total_pages(total, controller.page_size());

        Self {
            status,
            error: snapshot.error.clone(),
            items: results[range].to_vec(),
            page: controller.state().page.clamp(1, total_pages),
            total_pages,
            total,
            options,
        }
    }

    /// The "Showing X of Y" line.
    #[must_use]
    pub fn showing(&self) -> String {
        format!("Showing {} of {}", self.items.len(), self.total)
    }

    /// The "Page X of Y" line.
    #[must_use]
    pub fn page_line(&self) -> String {
        format!("Page {} of {}", self.page, self.total_pages)
    }
}
