use std::path::PathBuf;
use thiserror::Error;

/// The main error type for dataset operations.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid {field}: must be a non-empty identifier")]
    InvalidIdentifier { field: &'static str },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid catalog URL '{url}': {source}")]
    InvalidCatalogUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("HTTP request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("Failed to parse catalog response from {url}: {source}")]
    CatalogParse {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Catalog rejected request {url}: {message}")]
    CatalogRejected { url: String, message: String },

    #[error("Sub package '{sub_package}' not found in dataset '{name}'")]
    SubPackageNotFound { name: String, sub_package: String },

    #[error("Unsupported format '{format}' for resource '{resource}' (only CSV is supported)")]
    UnsupportedFormat { resource: String, format: String },

    #[error("Failed to parse CSV from {url}: {source}")]
    CsvParse {
        url: String,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write CSV: {source}")]
    CsvWrite {
        #[source]
        source: csv::Error,
    },

    #[error("Invalid last-modified timestamp '{value}'")]
    InvalidTimestamp { value: String },

    #[error("Cache unavailable at {path}: {reason}")]
    CacheUnavailable { path: PathBuf, reason: String },

    #[error("Failed to write cache file {path}: {source}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize report: {0}")]
    ReportSerialize(#[source] serde_json::Error),
}

impl DatasetError {
    /// Whether this error means a cache record could not be used.
    ///
    /// Construction falls back to the network only for this kind.
    pub fn is_cache_unavailable(&self) -> bool {
        matches!(self, DatasetError::CacheUnavailable { .. })
    }
}
