//! Error types for launchdex
//!
//! Indexing-side failures (provider scans, store writes) are recoverable and
//! absorbed by the indexer. Query-side code never returns these; it degrades
//! to a `QueryStatus` instead. We use `thiserror` for automatic `Display` and
//! `Error` trait implementations.

use crate::config::ConfigValidationError;
use crate::types::ProviderId;
use std::io;
use thiserror::Error;

/// Result type alias for launchdex operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the launchdex engine
#[derive(Debug, Error)]
pub enum Error {
    /// A discovery provider failed to produce its scan.
    ///
    /// Soft: retried at the next reconciliation interval.
    #[error("Provider scan failed for '{provider}': {reason}")]
    ProviderScan {
        /// Provider that failed
        provider: ProviderId,
        /// Human-readable cause
        reason: String,
    },

    /// Index store I/O failure. The previous durable state stays authoritative.
    #[error("Store I/O error: {0}")]
    StoreIo(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Persisted data failed validation
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Config file could not be read or parsed
    #[error("Config error: {0}")]
    ConfigParse(String),

    /// Config file watching could not be set up
    #[error("Config watch error: {0}")]
    ConfigWatch(String),

    /// Rejected configuration update
    #[error("Invalid configuration: {0}")]
    ConfigValidation(#[from] ConfigValidationError),

    /// A bounded queue is full
    #[error("Indexer queue is full")]
    Backpressure,

    /// The component has been shut down
    #[error("Indexer has shut down")]
    Shutdown,
}

impl Error {
    /// Build a provider scan error.
    pub fn provider_scan(provider: impl Into<ProviderId>, reason: impl Into<String>) -> Self {
        Error::ProviderScan {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// True for errors the indexer retries on its next cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ProviderScan { .. } | Error::StoreIo(_) | Error::Backpressure
        )
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
