//! Configuration management for fcbase.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "fcbase";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "compare.db";

/// Default flattened search bundle, relative to the data directory.
const INDEX_FILE_NAME: &str = "pagefind/controllers.json";

/// Largest accepted search debounce.
const MAX_DEBOUNCE_MS: u64 = 2_000;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `FCBASE_`, sections split on `__`)
/// 2. TOML config file at `~/.config/fcbase/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Compare list configuration.
    pub compare: CompareConfig,
    /// Search configuration.
    pub search: SearchConfig,
    /// Catalog content configuration.
    pub catalog: CatalogConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/fcbase/compare.db`
    pub database_path: Option<PathBuf>,
}

/// Compare list configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    /// Key namespace; keys take the form `<namespace>:compare:<category>`.
    pub namespace: String,
    /// Known categories and their legacy keys.
    pub categories: Vec<CategoryConfig>,
    /// Poll interval of the storage watcher in milliseconds.
    pub watch_interval_ms: u64,
}

/// A compare category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Category name (e.g. `controller`).
    pub name: String,
    /// Keys migrated into this category on first read.
    #[serde(default)]
    pub legacy_keys: Vec<String>,
}

impl CategoryConfig {
    /// Create a category with no legacy keys.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            legacy_keys: Vec::new(),
        }
    }

    /// Add a legacy key.
    #[must_use]
    pub fn with_legacy_key(mut self, key: impl Into<String>) -> Self {
        self.legacy_keys.push(key.into());
        self
    }
}

/// Search-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Path to the flattened JSON bundle.
    /// Defaults to `~/.local/share/fcbase/pagefind/controllers.json`
    pub index_path: Option<PathBuf>,
    /// Site base path used when building listing URLs.
    pub base_path: String,
    /// Debounce applied to query text changes in milliseconds.
    pub debounce_ms: u64,
    /// Results per listing page.
    pub page_size: usize,
}

/// Catalog content configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Root of the YAML content tree.
    pub content_dir: PathBuf,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            namespace: DATA_DIR_NAME.to_string(),
            categories: default_categories(),
            watch_interval_ms: 500,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            index_path: None, // Will be resolved to default at runtime
            base_path: String::new(),
            debounce_ms: 300,
            page_size: 24,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            content_dir: PathBuf::from("src/content"),
        }
    }
}

/// Default compare categories.
fn default_categories() -> Vec<CategoryConfig> {
    vec![
        CategoryConfig::new("controller").with_legacy_key("fcbase:compare"),
        CategoryConfig::new("transmitter"),
    ]
}

fn is_slug(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('-')
        && !name.ends_with('-')
        && !name.contains("--")
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("FCBASE_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.search.page_size == 0 {
            return Err(Error::ConfigValidation {
                message: "page_size must be greater than 0".to_string(),
            });
        }

        if !(1..=MAX_DEBOUNCE_MS).contains(&self.search.debounce_ms) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "debounce_ms must be between 1 and {MAX_DEBOUNCE_MS} (got {})",
                    self.search.debounce_ms
                ),
            });
        }

        if self.compare.namespace.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "compare namespace must not be empty".to_string(),
            });
        }

        if self.compare.watch_interval_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "watch_interval_ms must be greater than 0".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for category in &self.compare.categories {
            if !is_slug(&category.name) {
                return Err(Error::ConfigValidation {
                    message: format!(
                        "invalid category name '{}': expected a lowercase slug",
                        category.name
                    ),
                });
            }
            if !seen.insert(category.name.as_str()) {
                return Err(Error::ConfigValidation {
                    message: format!("duplicate category '{}'", category.name),
                });
            }
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the search bundle path, resolving defaults if not set.
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.search
            .index_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(INDEX_FILE_NAME))
    }

    /// Look up a configured compare category.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCategory`] when no category has that name.
    pub fn category(&self, name: &str) -> Result<&CategoryConfig> {
        self.compare
            .categories
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::UnknownCategory(name.to_string()))
    }

    /// Get the search debounce as a Duration.
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.search.debounce_ms)
    }

    /// Get the storage watcher interval as a Duration.
    #[must_use]
    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.compare.watch_interval_ms)
    }
}
