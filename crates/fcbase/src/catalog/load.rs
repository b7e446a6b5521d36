//! Reading catalog records from the YAML content tree.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::spec::{Controller, Manufacturer, Mcu, Transmitter};
use crate::error::{Error, Result};

/// File extensions recognised as catalog records.
const RECORD_EXTENSIONS: &[&str] = &["yaml", "yml"];

/// A record together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry<T> {
    /// Slug derived from the path relative to the collection root.
    pub slug: String,
    /// File the record was read from.
    pub path: PathBuf,
    /// The parsed record.
    pub data: T,
}

/// Derive a slug from a record path relative to its collection root.
///
/// Separators become `/`, the extension is dropped, and a trailing `index`
/// segment is removed so `matek/h743/index.yaml` maps to `matek/h743`.
#[must_use]
pub fn slug_for(relative: &Path) -> String {
    let without_ext = relative.with_extension("");
    let joined = without_ext
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

    let lower = joined.to_ascii_lowercase();
    if lower == "index" {
        String::new()
    } else if lower.ends_with("/index") {
        joined[..joined.len() - "/index".len()].to_string()
    } else {
        joined
    }
}

/// Parse one record file.
///
/// Returns `Ok(None)` when the document has no `id`.
///
/// # Errors
///
/// Returns [`Error::CatalogLoad`] when the file can't be read or doesn't
/// match the record type.
pub fn load_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let content = fs::read_to_string(path).map_err(|e| Error::CatalogLoad {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let value: serde_yaml::Value =
        serde_yaml::from_str(&content).map_err(|e| Error::CatalogLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let has_id = value
        .get("id")
        .and_then(serde_yaml::Value::as_str)
        .is_some_and(|id| !id.trim().is_empty());
    if !has_id {
        return Ok(None);
    }

    serde_yaml::from_value(value)
        .map(Some)
        .map_err(|e| Error::CatalogLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

/// Recursively load every record below `root`.
///
/// A missing directory yields an empty list. Files are visited in path order
/// so the result is stable across platforms.
///
/// # Errors
///
/// Returns an error if a directory can't be listed or a record fails to
/// parse.
pub fn load_dir<T: DeserializeOwned>(root: &Path) -> Result<Vec<Entry<T>>> {
    if !root.is_dir() {
        debug!(path = %root.display(), "Catalog directory missing, treating as empty");
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    collect_files(root, &mut files)?;
    files.sort();

    let mut entries = Vec::with_capacity(files.len());
    for path in files {
        let Some(data) = load_file::<T>(&path)? else {
            warn!(path = %path.display(), "Skipping record without id");
            continue;
        };
        let relative = path.strip_prefix(root).unwrap_or(&path);
        entries.push(Entry {
            slug: slug_for(relative),
            path,
            data,
        });
    }

    debug!(path = %root.display(), count = entries.len(), "Loaded catalog records");
    Ok(entries)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| RECORD_EXTENSIONS.contains(&ext))
        {
            out.push(path);
        }
    }
    Ok(())
}

/// Every collection the search and compare tools need.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    /// Flight controllers.
    pub controllers: Vec<Entry<Controller>>,
    /// Radio transmitters.
    pub transmitters: Vec<Entry<Transmitter>>,
    /// Manufacturers by id.
    pub manufacturers: HashMap<String, Manufacturer>,
    /// MCUs by id.
    pub mcus: HashMap<String, Mcu>,
}

impl Catalog {
    /// Load the content tree rooted at `content_dir`.
    ///
    /// Expects `controllers/`, `transmitters/`, `manufacturers/` and `mcu/`
    /// below the root; any of them may be absent.
    ///
    /// # Errors
    ///
    /// Returns an error if any record fails to load.
    pub fn load(content_dir: &Path) -> Result<Self> {
        let manufacturers = load_dir::<Manufacturer>(&content_dir.join("manufacturers"))?
            .into_iter()
            .map(|e| (e.data.id.clone(), e.data))
            .collect();
        let mcus = load_dir::<Mcu>(&content_dir.join("mcu"))?
            .into_iter()
            .map(|e| (e.data.id.clone(), e.data))
            .collect();

        Ok(Self {
            controllers: load_dir(&content_dir.join("controllers"))?,
            transmitters: load_dir(&content_dir.join("transmitters"))?,
            manufacturers,
            mcus,
        })
    }

    /// Look up a manufacturer by id.
    #[must_use]
    pub fn manufacturer(&self, id: &str) -> Option<&Manufacturer> {
        self.manufacturers.get(id)
    }

    /// Look up an MCU by id.
    #[must_use]
    pub fn mcu(&self, id: &str) -> Option<&Mcu> {
        self.mcus.get(id)
    }

    /// Find a controller by id.
    #[must_use]
    pub fn controller(&self, id: &str) -> Option<&Controller> {
        self.controllers
            .iter()
            .map(|e| &e.data)
            .find(|c| c.id == id)
    }

    /// Ids of every record in a compare category.
    ///
    /// Returns `None` for categories the catalog doesn't hold.
    #[must_use]
    pub fn known_ids(&self, category: &str) -> Option<Vec<String>> {
        match category {
            "controller" => Some(self.controllers.iter().map(|e| e.data.id.clone()).collect()),
            "transmitter" => Some(
                self.transmitters
                    .iter()
                    .map(|e| e.data.id.clone())
                    .collect(),
            ),
            _ => None,
        }
    }
}
