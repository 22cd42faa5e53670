//! Configuration schema for imcache
//!
//! Configuration is stored at `~/.config/imcache/config.toml`

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Image cache settings
    pub cache: CacheConfig,

    /// Periodic pruning
    pub watch: WatchConfig,

    /// Named storage disks, keyed by URL scheme
    pub disks: HashMap<String, DiskConfig>,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Image cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding cached images
    pub path: PathBuf,

    /// Maximum total cache size in bytes enforced by pruning
    pub max_size: u64,

    /// Maximum size of a single cached image in bytes (0 = unlimited)
    pub max_image_size: u64,
}

impl CacheConfig {
    /// Default cache directory
    pub fn default_path() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("imcache")
            .join("images")
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            max_size: 10 * 1024 * 1024 * 1024,
            max_image_size: 100 * 1024 * 1024,
        }
    }
}

/// Periodic prune settings for `imcache watch`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Seconds between prune passes
    pub interval_secs: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

/// A named storage disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "lowercase")]
pub enum DiskConfig {
    /// Files below a local directory, read in place
    Local {
        /// Root directory of the disk
        root: PathBuf,
    },
    /// Objects served over HTTP from `endpoint`
    Cloud {
        /// Base URL objects are resolved against
        endpoint: String,
        /// Optional bearer token
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
        /// Transfer timeout in seconds
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}
