//! Error types for imcache
//!
//! All modules use `CacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for imcache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// All errors that can occur in imcache
#[derive(Error, Debug)]
pub enum CacheError {
    // Backend errors
    #[error("Storage disk '{scheme}' is not available: {reason}")]
    BackendUnavailable { scheme: String, reason: String },

    #[error("Error while caching image {id} after {attempts} attempt(s): {source}")]
    Fetch {
        id: String,
        attempts: u32,
        #[source]
        source: Box<CacheError>,
    },

    #[error("Image {id} is too large, exceeds {max_bytes} bytes")]
    TransferTooLarge { id: String, max_bytes: u64 },

    #[error("Transfer failed for {location}: {source}")]
    Transfer {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid image id: {0:?}")]
    InvalidImageId(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl CacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a backend-unavailable error
    pub fn backend_unavailable(scheme: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            scheme: scheme.into(),
            reason: reason.into(),
        }
    }

    /// Create a transfer error
    pub fn transfer(location: impl Into<String>, source: std::io::Error) -> Self {
        Self::Transfer {
            location: location.into(),
            source,
        }
    }

    /// Check if a failed populate attempt may succeed when repeated
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transfer { .. } | Self::Io { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::BackendUnavailable { .. } => {
                Some("Add a [disks.<name>] section to the configuration file")
            }
            Self::TransferTooLarge { .. } => Some("Raise cache.max_image_size in the configuration"),
            Self::ConfigInvalid { .. } => Some("Run: imcache config init --force"),
            _ => None,
        }
    }
}
