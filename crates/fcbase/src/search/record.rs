//! Flattened search records and the JSON bundle they're exported to.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::facets::Facet;
use crate::catalog::{Catalog, Controller, Entry};
use crate::error::{Error, Result};

/// Denormalized projection of a controller used for search and faceting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRecord {
    /// Controller id.
    pub id: String,
    /// Slug derived from the content path.
    pub slug: String,
    /// Display title.
    pub title: String,
    /// Manufacturer id.
    pub brand: String,
    /// Manufacturer display name.
    pub brand_name: String,
    /// Model, falling back to the title.
    pub model: String,
    /// MCU id.
    pub mcu: String,
    /// MCU display name.
    pub mcu_name: String,
    /// Normalized MCU family (e.g. `STM32H7`).
    pub mcu_family: String,
    /// Mounting pattern.
    pub mounting: String,
    /// UART count.
    #[serde(default)]
    pub uarts: Option<u32>,
    /// CAN bus count.
    #[serde(default)]
    pub can: u32,
    /// MicroSD slot.
    #[serde(default)]
    pub sd: bool,
    /// Supported firmware ids.
    #[serde(default)]
    pub firmware_ids: Vec<String>,
    /// Distinct firmware support statuses.
    #[serde(default)]
    pub firmware_statuses: Vec<String>,
    /// Lowercase lifecycle, `unknown` when not recorded.
    pub lifecycle: String,
    /// SEO summary.
    #[serde(default)]
    pub summary: String,
    /// Free-form notes.
    #[serde(default)]
    pub notes: String,
    /// Search keywords.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Feature list.
    #[serde(default)]
    pub features: Vec<String>,
    /// Detail page URL.
    pub url: String,
    /// Facet values by facet name.
    #[serde(default)]
    pub filters: BTreeMap<String, Vec<String>>,
}

impl SearchRecord {
    /// Build a record from a loaded controller.
    #[must_use]
    pub fn from_entry(entry: &Entry<Controller>, catalog: &Catalog) -> Self {
        let data = &entry.data;

        let brand_name = catalog
            .manufacturer(&data.brand)
            .map_or_else(|| data.brand.clone(), |m| m.display_name().to_string());
        let mcu = catalog.mcu(&data.mcu);
        let mcu_name = mcu.map_or_else(|| data.mcu.clone(), |m| m.display_name().to_string());
        let mcu_family = normalize_mcu_family(
            mcu.and_then(|m| m.family.as_deref())
                .or(data.mcu_family.as_deref()),
        );

        let firmware_statuses = dedup(
            data.firmware_support
                .iter()
                .map(|fw| fw.status.as_str().to_string()),
        );
        let firmware_ids = dedup(data.firmware_support.iter().map(|fw| fw.id.clone()));

        let keywords = match data.seo.as_ref().and_then(|s| s.keywords.as_ref()) {
            Some(seo) if !seo.is_empty() => seo.clone(),
            _ => data.keywords.clone(),
        };

        let lifecycle = normalize_lifecycle(
            data.lifecycle
                .as_deref()
                .or(data.hardware.lifecycle.as_deref()),
        );
        let mounting = data.mounting.as_str().to_string();
        let flag = |on: bool| String::from(if on { "1" } else { "0" });

        let mut filters = BTreeMap::new();
        filters.insert(Facet::Mcu.as_str().to_string(), vec![mcu_family.clone()]);
        filters.insert(Facet::Mounting.as_str().to_string(), vec![mounting.clone()]);
        filters.insert(
            Facet::Uarts.as_str().to_string(),
            vec![bucketize_uarts(data.io.uarts).to_string()],
        );
        filters.insert(Facet::Can.as_str().to_string(), vec![flag(data.io.can > 0)]);
        filters.insert(Facet::Sd.as_str().to_string(), vec![flag(data.io.sd_card)]);
        if !firmware_statuses.is_empty() {
            filters.insert(Facet::Firmware.as_str().to_string(), firmware_statuses.clone());
        }
        filters.insert(Facet::Lifecycle.as_str().to_string(), vec![lifecycle.clone()]);

        Self {
            id: data.id.clone(),
            slug: entry.slug.clone(),
            title: data.title.clone(),
            brand: data.brand.clone(),
            brand_name,
            model: data.model.clone().unwrap_or_else(|| data.title.clone()),
            mcu: data.mcu.clone(),
            mcu_name,
            mcu_family,
            mounting,
            uarts: Some(data.io.uarts),
            can: data.io.can,
            sd: data.io.sd_card,
            firmware_ids,
            firmware_statuses,
            lifecycle,
            summary: data
                .seo
                .as_ref()
                .and_then(|s| s.summary.clone())
                .unwrap_or_default(),
            notes: data.notes.clone().unwrap_or_default(),
            keywords,
            features: data.features.clone(),
            url: format!("/controllers/{}/", entry.slug),
            filters,
        }
    }

    /// Facet values recorded for `facet`.
    #[must_use]
    pub fn facet_values(&self, facet: Facet) -> &[String] {
        self.filters
            .get(facet.as_str())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Build records for every controller in the catalog, sorted by title.
#[must_use]
pub fn build_records(catalog: &Catalog) -> Vec<SearchRecord> {
    let mut records: Vec<SearchRecord> = catalog
        .controllers
        .iter()
        .map(|entry| SearchRecord::from_entry(entry, catalog))
        .collect();
    sort_by_title(&mut records);
    debug!(count = records.len(), "Built search records");
    records
}

/// Sort records by title, ignoring case.
pub fn sort_by_title(records: &mut [SearchRecord]) {
    records.sort_by(|a, b| {
        a.title
            .to_lowercase()
            .cmp(&b.title.to_lowercase())
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Write records as pretty JSON, creating parent directories.
///
/// # Errors
///
/// Returns an error if the directory or file can't be written.
pub fn export(records: &[SearchRecord], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json)?;
    info!(path = %path.display(), count = records.len(), "Exported search records");
    Ok(())
}

/// Read a bundle written by [`export`].
///
/// # Errors
///
/// Returns an error if the file can't be read or parsed.
pub fn load_bundle(path: &Path) -> Result<Vec<SearchRecord>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Bucket a UART count for the `uarts` facet.
#[must_use]
pub fn bucketize_uarts(count: u32) -> &'static str {
    match count {
        0..=4 => "0-4",
        5..=6 => "5-6",
        7..=8 => "7-8",
        9..=10 => "9-10",
        _ => "11+",
    }
}

/// Normalize an MCU family for display and faceting.
///
/// STM32 families are uppercased; a missing family becomes `Unknown`.
#[must_use]
pub fn normalize_mcu_family(family: Option<&str>) -> String {
    let trimmed = family.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return "Unknown".to_string();
    }
    if trimmed
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("stm32"))
    {
        trimmed.to_uppercase()
    } else {
        trimmed.to_string()
    }
}

/// Lowercase lifecycle, `unknown` when missing.
#[must_use]
pub fn normalize_lifecycle(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_lowercase(),
        _ => "unknown".to_string(),
    }
}

fn dedup(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if !value.is_empty() && !out.contains(&value) {
            out.push(value);
        }
    }
    out
}
