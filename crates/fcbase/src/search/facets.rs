//! Facet definitions, selections and counts.
//!
//! Selected values combine with OR inside one facet and AND across facets.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::record::SearchRecord;
use crate::error::Error;

/// A filter dimension of the controller listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    /// MCU family.
    Mcu,
    /// Mounting pattern.
    Mounting,
    /// UART count bucket.
    Uarts,
    /// Product lifecycle.
    Lifecycle,
    /// Has a CAN bus.
    Can,
    /// Has a MicroSD slot.
    Sd,
    /// Firmware support status.
    Firmware,
}

impl Facet {
    /// Every facet in listing order.
    pub const ALL: [Self; 7] = [
        Self::Mcu,
        Self::Mounting,
        Self::Uarts,
        Self::Lifecycle,
        Self::Can,
        Self::Sd,
        Self::Firmware,
    ];

    /// Facet name as used in records and URLs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mcu => "mcu",
            Self::Mounting => "mounting",
            Self::Uarts => "uarts",
            Self::Lifecycle => "lifecycle",
            Self::Can => "can",
            Self::Sd => "sd",
            Self::Firmware => "firmware",
        }
    }

    /// Whether the facet is an on/off toggle selecting `"1"`.
    #[must_use]
    pub fn is_toggle(&self) -> bool {
        matches!(self, Self::Can | Self::Sd)
    }

    /// Whether more than one value may be selected.
    #[must_use]
    pub fn is_multi(&self) -> bool {
        matches!(self, Self::Firmware)
    }
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Facet {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|facet| facet.as_str() == s)
            .ok_or_else(|| Error::internal(format!("unknown facet '{s}'")))
    }
}

/// Selected values per facet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetFilters {
    selected: BTreeMap<Facet, Vec<String>>,
}

impl FacetFilters {
    /// No selections.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with<I, T>(mut self, facet: Facet, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.set(facet, values);
        self
    }

    /// Replace the selection for a facet. An empty selection clears it.
    pub fn set<I, T>(&mut self, facet: Facet, values: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for value in values.into_iter().map(Into::into) {
            if !value.is_empty() && !unique.contains(&value) {
                unique.push(value);
            }
        }

        if unique.is_empty() {
            self.selected.remove(&facet);
        } else {
            self.selected.insert(facet, unique);
        }
    }

    /// Clear one facet.
    pub fn clear(&mut self, facet: Facet) {
        self.selected.remove(&facet);
    }

    /// Selected values for a facet.
    #[must_use]
    pub fn get(&self, facet: Facet) -> &[String] {
        self.selected
            .get(&facet)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether nothing is selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    /// Iterate over facets with a selection.
    pub fn iter(&self) -> impl Iterator<Item = (Facet, &[String])> {
        self.selected
            .iter()
            .map(|(facet, values)| (*facet, values.as_slice()))
    }

    /// Whether a record satisfies every selected facet.
    #[must_use]
    pub fn matches(&self, record: &SearchRecord) -> bool {
        self.selected.iter().all(|(facet, wanted)| {
            let values = record.facet_values(*facet);
            wanted.iter().any(|w| values.contains(w))
        })
    }
}

/// Value counts per facet name.
pub type FacetCounts = BTreeMap<String, BTreeMap<String, usize>>;

/// Count facet values over `records`.
#[must_use]
pub fn count_facets<'a, I>(records: I) -> FacetCounts
where
    I: IntoIterator<Item = &'a SearchRecord>,
{
    let mut counts = FacetCounts::new();
    for record in records {
        for (facet, values) in &record.filters {
            let entry = counts.entry(facet.clone()).or_default();
            for value in values {
                *entry.entry(value.clone()).or_default() += 1;
            }
        }
    }
    counts
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Minimal record with the given facet values.
    pub(crate) fn record(id: &str, facets: &[(Facet, &[&str])]) -> SearchRecord {
        SearchRecord {
            id: id.to_string(),
            slug: id.to_string(),
            title: id.to_string(),
            brand: String::new(),
            brand_name: String::new(),
            model: String::new(),
            mcu: String::new(),
            mcu_name: String::new(),
            mcu_family: String::new(),
            mounting: String::new(),
            uarts: None,
            can: 0,
            sd: false,
            firmware_ids: Vec::new(),
            firmware_statuses: Vec::new(),
            lifecycle: "unknown".to_string(),
            summary: String::new(),
            notes: String::new(),
            keywords: Vec::new(),
            features: Vec::new(),
            url: format!("/controllers/{id}/"),
            filters: facets
                .iter()
                .map(|(facet, values)| {
                    (
                        facet.as_str().to_string(),
                        values.iter().map(|v| (*v).to_string()).collect(),
                    )
                })
                .collect(),
        }
    }

    fn items() -> Vec<SearchRecord> {
        vec![
            record(
                "1",
                &[(Facet::Firmware, &["stable"]), (Facet::Mounting, &["20x20"])],
            ),
            record(
                "2",
                &[(Facet::Firmware, &["beta"]), (Facet::Mounting, &["20x20"])],
            ),
            record(
                "3",
                &[
                    (Facet::Firmware, &["stable", "beta"]),
                    (Facet::Mounting, &["30.5x30.5"]),
                ],
            ),
        ]
    }

    fn matching(filters: &FacetFilters) -> Vec<String> {
        items()
            .into_iter()
            .filter(|r| filters.matches(r))
            .map(|r| r.id)
            .collect()
    }

    #[test]
    fn test_or_within_facet() {
        let filters = FacetFilters::new().with(Facet::Firmware, ["stable", "beta"]);
        assert_eq!(matching(&filters), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_and_across_facets() {
        let filters = FacetFilters::new()
            .with(Facet::Firmware, ["stable", "beta"])
            .with(Facet::Mounting, ["30.5x30.5"]);
        assert_eq!(matching(&filters), vec!["3"]);
    }

    #[test]
    fn test_empty_filters_match_everything() {
        assert_eq!(matching(&FacetFilters::new()), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_missing_facet_never_matches() {
        let filters = FacetFilters::new().with(Facet::Lifecycle, ["active"]);
        assert!(matching(&filters).is_empty());
    }

    #[test]
    fn test_set_dedups_and_clears() {
        let mut filters = FacetFilters::new();
        filters.set(Facet::Firmware, ["beta", "beta", ""]);
        assert_eq!(filters.get(Facet::Firmware), ["beta"]);

        filters.set(Facet::Firmware, Vec::<String>::new());
        assert!(filters.is_empty());
    }

    #[test]
    fn test_facet_from_str() {
        assert_eq!("mcu".parse::<Facet>().unwrap(), Facet::Mcu);
        assert_eq!("firmware".parse::<Facet>().unwrap(), Facet::Firmware);
        assert!("color".parse::<Facet>().is_err());
        assert!(Facet::Can.is_toggle());
        assert!(Facet::Firmware.is_multi());
        assert!(!Facet::Mcu.is_multi());
    }

    #[test]
    fn test_count_facets() {
        let items = items();
        let counts = count_facets(&items);

        assert_eq!(counts["firmware"]["stable"], 2);
        assert_eq!(counts["firmware"]["beta"], 2);
        assert_eq!(counts["mounting"]["20x20"], 2);
        assert_eq!(counts["mounting"]["30.5x30.5"], 1);
    }
}
