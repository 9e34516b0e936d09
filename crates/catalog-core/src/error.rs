//! Error taxonomy shared by the fetcher, the snapshot stores and the HTTP layer.

use std::fmt;
use thiserror::Error;

/// Errors produced while fetching, decoding, storing or serving the catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A required setting or credential is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network failure or timeout while talking to the upstream.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The upstream answered with a status other than 200.
    #[error("Upstream responded with status {status}")]
    Upstream {
        /// HTTP status code returned by the upstream.
        status: u16,
    },

    /// The catalog payload or one of its records is malformed.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The external key-value service failed.
    #[error("Backing store error: {0}")]
    BackingStore(String),

    /// No refresh has succeeded yet, so there is nothing to serve.
    #[error("Catalog data is not available yet, try again later")]
    Unavailable,
}

impl CatalogError {
    /// Create a new Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a new Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a new Upstream error
    pub fn upstream(status: u16) -> Self {
        Self::Upstream { status }
    }

    /// Create a new Decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Create a new BackingStore error
    pub fn backing_store(message: impl Into<String>) -> Self {
        Self::BackingStore(message.into())
    }

    /// Returns `true` for the empty-store marker.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Transport(_) | Self::Upstream { .. } => ErrorCategory::Upstream,
            Self::Decode(_) => ErrorCategory::Serialization,
            Self::BackingStore(_) => ErrorCategory::Infrastructure,
            Self::Unavailable => ErrorCategory::Unavailable,
        }
    }
}

/// Coarse error categories used as a structured logging field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Upstream,
    Serialization,
    Infrastructure,
    Unavailable,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Upstream => write!(f, "upstream"),
            Self::Serialization => write!(f, "serialization"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;
