//! Image descriptors consumed by the cache

use crate::error::{CacheError, CacheResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable identifier of an image, used verbatim as the cache file name
///
/// Deserialization goes through [`ImageId::new`], so every id is a plain
/// file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ImageId(String);

impl ImageId {
    /// Create an id, rejecting values that are not a plain file name
    pub fn new(id: impl Into<String>) -> CacheResult<Self> {
        let id = id.into();
        let valid = !id.is_empty()
            && !id.starts_with('.')
            && !id.contains(['/', '\\', '\0']);
        if !valid {
            return Err(CacheError::InvalidImageId(id));
        }
        Ok(Self(id))
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ImageId {
    type Error = CacheError;

    fn try_from(id: String) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<ImageId> for String {
    fn from(id: ImageId) -> Self {
        id.0
    }
}

impl From<u64> for ImageId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where the bytes of an image live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Plain HTTP(S) URL
    Remote,
    /// `scheme://path` on a named storage disk
    Disk,
    /// Plain path on the local filesystem
    Local,
}

impl Origin {
    /// Whether images of this origin go through the cache directory
    pub fn is_remote_or_cloud(&self) -> bool {
        matches!(self, Self::Remote | Self::Disk)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote => write!(f, "remote"),
            Self::Disk => write!(f, "disk"),
            Self::Local => write!(f, "local"),
        }
    }
}

impl FromStr for Origin {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(Self::Remote),
            "disk" => Ok(Self::Disk),
            "local" => Ok(Self::Local),
            other => Err(CacheError::User(format!("Unknown image origin: {}", other))),
        }
    }
}

/// An image as seen by the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDescriptor {
    /// Cache file name
    pub id: ImageId,
    /// URL, `scheme://path` or filesystem path depending on `origin`
    pub location: String,
    /// Kind of backend holding the image
    pub origin: Origin,
}

impl ImageDescriptor {
    /// Create a new descriptor
    pub fn new(id: impl Into<ImageId>, location: impl Into<String>, origin: Origin) -> Self {
        Self {
            id: id.into(),
            location: location.into(),
            origin,
        }
    }

    /// Image fetched over HTTP from a plain URL
    pub fn remote(id: impl Into<ImageId>, url: impl Into<String>) -> Self {
        Self::new(id, url, Origin::Remote)
    }

    /// Image stored on a named storage disk
    pub fn disk(id: impl Into<ImageId>, location: impl Into<String>) -> Self {
        Self::new(id, location, Origin::Disk)
    }

    /// Image stored at a plain local path
    pub fn local(id: impl Into<ImageId>, path: impl Into<String>) -> Self {
        Self::new(id, path, Origin::Local)
    }

    /// Whether this image is cached when accessed
    pub fn is_remote_or_cloud(&self) -> bool {
        self.origin.is_remote_or_cloud()
    }
}
