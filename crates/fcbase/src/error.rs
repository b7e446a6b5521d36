//! Error types for fcbase.
//!
//! This module defines the error taxonomy shared by the catalog loader, the
//! compare-list storage and the search client. Some failures are not errors:
//! a corrupt persisted list reads as empty, and a missing search index
//! degrades to an unfiltered listing.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for fcbase operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Catalog Errors ===
    /// A catalog file could not be read or parsed.
    #[error("failed to load catalog file {path}: {message}")]
    CatalogLoad {
        /// Path of the offending file.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    /// A catalog record failed validation.
    #[error("invalid record '{record}' at {field}: {message}")]
    InvalidRecord {
        /// Id of the record (or file stem when the id is missing).
        record: String,
        /// Dotted path of the offending field.
        field: String,
        /// Description of the violation.
        message: String,
    },

    /// A compare category is not configured.
    #[error("unknown compare category '{0}'")]
    UnknownCategory(String),

    // === Search Errors ===
    /// The search index could not be loaded.
    #[error("search index unavailable: {message}")]
    IndexUnavailable {
        /// Description of why the index is unavailable.
        message: String,
    },

    /// A search query failed after the index was loaded.
    #[error("search query failed: {message}")]
    QueryFailed {
        /// Description of what went wrong.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for fcbase operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a record validation error.
    #[must_use]
    pub fn invalid_record(
        record: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidRecord {
            record: record.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an index-unavailable error.
    #[must_use]
    pub fn index_unavailable(message: impl Into<String>) -> Self {
        Self::IndexUnavailable {
            message: message.into(),
        }
    }

    /// Create a query failure error.
    #[must_use]
    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::QueryFailed {
            message: message.into(),
        }
    }

    /// Check if this error means the search index could not be loaded.
    #[must_use]
    pub fn is_index_unavailable(&self) -> bool {
        matches!(self, Self::IndexUnavailable { .. })
    }

    /// Check if the caller can keep going with a degraded experience.
    ///
    /// Index and query failures leave a usable (unfiltered or last-good)
    /// listing behind; everything else is fatal for the operation.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::IndexUnavailable { .. } | Self::QueryFailed { .. }
        )
    }
}
