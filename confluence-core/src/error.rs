//! Error types for Confluence operations

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// SOURCE ERRORS
// ============================================================================

/// Marker for the error payload carried inside `error` states.
///
/// Source errors are opaque to the reconciliation engine: it only carries
/// and merges them. They must be cheap to clone because every merged state
/// holds its own copy.
pub trait DatasourceError: std::error::Error + Clone + PartialEq + Send + Sync + 'static {}

/// Source errors that can be synthesized when the cache has nothing to offer.
///
/// A bundle that wraps a bare persister as a datasource needs an error to
/// emit when no cache-compatible state is stored; this constructor provides it.
pub trait CachedDatasourceError: DatasourceError {
    /// Build the error emitted by a cache datasource on a cache miss.
    fn from_cache_load_error(error_type: DatasourceErrorType) -> Self;
}

/// Coarse classification of a datasource error.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "type", content = "message", rename_all = "snake_case")]
pub enum DatasourceErrorType {
    /// No further detail available.
    #[default]
    Default,
    /// Human readable detail.
    Message(String),
}

impl DatasourceErrorType {
    /// Create a message error type.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

impl fmt::Display for DatasourceErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Message(message) => write!(f, "{message}"),
        }
    }
}

// ============================================================================
// INFRASTRUCTURE ERRORS
// ============================================================================

/// Persistence layer errors.
///
/// These never surface through a merged state stream. Callers of a
/// persister log them and continue as if nothing had been stored.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("Persister unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Deserialization failed: {reason}")]
    Deserialization { reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Persister lock poisoned")]
    LockPoisoned,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Master error type for all Confluence errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfluenceError {
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Confluence operations.
pub type ConfluenceResult<T> = Result<T, ConfluenceError>;

// =============================================================================
// TESTS
// =============================================================================
