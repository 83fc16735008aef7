//! Unified error types for the ETL engine.
//!
//! The taxonomy mirrors how the transform runner reacts to each failure:
//! - `InvalidRecord`: per-record, counted and skipped, never aborts a group
//! - `DuplicateFact`: the row is already processed, skipped silently
//! - `Store`: fatal to the current group transaction
//! - `Config`: fatal before any group starts
//! - `Api`: reporting-API failures surfaced by the collector

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the ETL engine.
#[derive(Debug, Error)]
pub enum Error {
    /// A raw row that fails validation (negative counts, bad position).
    /// Recovered locally by the runner: counted, then processing continues.
    #[error("invalid record {key}: {reason}")]
    InvalidRecord { key: String, reason: String },

    /// Uniqueness conflict on a processed fact. Not an error from the
    /// runner's point of view: the row has already been processed.
    #[error("fact already processed: {0}")]
    DuplicateFact(String),

    /// Storage/transaction failure. Fatal to the current group; earlier
    /// committed groups are retained.
    #[error("store error: {0}")]
    Store(String),

    /// Missing or invalid configuration, detected before any group runs.
    #[error("configuration error: {0}")]
    Config(String),

    /// Reporting-API failure (HTTP status, transport, or decode).
    #[error("reporting api error: {0}")]
    Api(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid_record(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn duplicate(key: impl Into<String>) -> Self {
        Self::DuplicateFact(key.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api(msg.into())
    }

    /// Whether the runner may recover from this error and move on to the
    /// next record within the same group.
    pub fn is_record_level(&self) -> bool {
        matches!(self, Self::InvalidRecord { .. } | Self::DuplicateFact(_))
    }
}
