//! Storage backends the cache reads images from
//!
//! A backend turns a location string into a readable byte stream. Named
//! storage disks are addressed as `scheme://path` and resolved through a
//! [`StorageRegistry`]; plain remote URLs bypass the lookup and go to the
//! registry's remote backend.
//!
//! | Backend | Addressed as | Direct path |
//! |---------|--------------|-------------|
//! | [`LocalDisk`] | `name://relative/path` | yes |
//! | [`CloudDisk`] | `name://object/key` | no |
//! | [`RemoteUrl`] | `https://host/image.jpg` | no |

pub mod http;
pub mod local;

pub use http::{CloudDisk, RemoteUrl};
pub use local::LocalDisk;

use crate::cache::image::{ImageDescriptor, Origin};
use crate::config::schema::DiskConfig;
use crate::error::{CacheError, CacheResult};
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Boxed byte stream returned by backends
pub type ByteStream = Box<dyn Read + Send>;

/// Interface shared by all storage backends
pub trait StorageBackend: Send + Sync {
    /// Open a read stream for `path`
    fn open(&self, path: &str) -> io::Result<ByteStream>;

    /// Filesystem path of `path` if the backend is a local mount
    ///
    /// Images with a direct path are read in place instead of copied into
    /// the cache.
    fn direct_path(&self, _path: &str) -> Option<PathBuf> {
        None
    }

    /// Short backend name for logs
    fn kind(&self) -> &'static str;
}

/// A `scheme://path` location on a named storage disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation<'a> {
    /// Disk name
    pub scheme: &'a str,
    /// Path on the disk
    pub path: &'a str,
}

impl<'a> SourceLocation<'a> {
    /// Split `scheme://path`
    pub fn parse(location: &'a str) -> CacheResult<Self> {
        match location.split_once("://") {
            Some((scheme, path)) if !scheme.is_empty() => Ok(Self { scheme, path }),
            _ => Err(CacheError::backend_unavailable(
                location,
                "location is not of the form scheme://path",
            )),
        }
    }
}

/// Where the bytes of an image can be read from
#[derive(Clone)]
pub enum Source {
    /// Readable in place on the local filesystem
    Direct(PathBuf),
    /// Must be streamed from a backend
    Stream {
        backend: Arc<dyn StorageBackend>,
        path: String,
    },
}

impl Source {
    /// Open the source for reading
    pub fn open(&self) -> CacheResult<ByteStream> {
        match self {
            Self::Direct(path) => std::fs::File::open(path)
                .map(|f| Box::new(f) as ByteStream)
                .map_err(|e| CacheError::transfer(path.display().to_string(), e)),
            Self::Stream { backend, path } => backend
                .open(path)
                .map_err(|e| CacheError::transfer(path.as_str(), e)),
        }
    }

    /// Human-readable description for logs and errors
    pub fn describe(&self) -> String {
        match self {
            Self::Direct(path) => path.display().to_string(),
            Self::Stream { backend, path } => format!("{} {}", backend.kind(), path),
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(path) => f.debug_tuple("Direct").field(path).finish(),
            Self::Stream { backend, path } => f
                .debug_struct("Stream")
                .field("backend", &backend.kind())
                .field("path", path)
                .finish(),
        }
    }
}

/// Mapping of disk names to backends plus the backend for plain URLs
#[derive(Clone)]
pub struct StorageRegistry {
    disks: HashMap<String, Arc<dyn StorageBackend>>,
    remote: Arc<dyn StorageBackend>,
}

impl StorageRegistry {
    /// Registry without disks, using HTTP for remote URLs
    pub fn new() -> Self {
        Self {
            disks: HashMap::new(),
            remote: Arc::new(RemoteUrl::default()),
        }
    }

    /// Build the registry from `[disks.<name>]` configuration tables
    pub fn from_config(disks: &HashMap<String, DiskConfig>) -> Self {
        let mut registry = Self::new();
        for (name, disk) in disks {
            let backend: Arc<dyn StorageBackend> = match disk {
                DiskConfig::Local { root } => Arc::new(LocalDisk::new(root.clone())),
                DiskConfig::Cloud {
                    endpoint,
                    token,
                    timeout_secs,
                } => Arc::new(CloudDisk::new(
                    endpoint.clone(),
                    token.clone(),
                    Duration::from_secs(*timeout_secs),
                )),
            };
            debug!("Registered {} disk '{}'", backend.kind(), name);
            registry.disks.insert(name.clone(), backend);
        }
        registry
    }

    /// Register a backend under a disk name
    pub fn with_disk(mut self, name: impl Into<String>, backend: Arc<dyn StorageBackend>) -> Self {
        self.disks.insert(name.into(), backend);
        self
    }

    /// Replace the backend used for plain remote URLs
    pub fn with_remote(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.remote = backend;
        self
    }

    /// Look up a disk by name
    pub fn disk(&self, name: &str) -> CacheResult<&Arc<dyn StorageBackend>> {
        self.disks
            .get(name)
            .ok_or_else(|| CacheError::backend_unavailable(name, "storage disk does not exist"))
    }

    /// Names of all registered disks, sorted
    pub fn disk_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.disks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve where the bytes of an image are read from
    pub fn resolve(&self, image: &ImageDescriptor) -> CacheResult<Source> {
        match image.origin {
            Origin::Local => Ok(Source::Direct(PathBuf::from(&image.location))),
            Origin::Remote => Ok(Source::Stream {
                backend: Arc::clone(&self.remote),
                path: image.location.clone(),
            }),
            Origin::Disk => {
                let location = SourceLocation::parse(&image.location)?;
                let backend = self.disk(location.scheme)?;
                match backend.direct_path(location.path) {
                    Some(path) => Ok(Source::Direct(path)),
                    None => Ok(Source::Stream {
                        backend: Arc::clone(backend),
                        path: location.path.to_string(),
                    }),
                }
            }
        }
    }
}

impl Default for StorageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StorageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageRegistry")
            .field("disks", &self.disk_names())
            .field("remote", &self.remote.kind())
            .finish()
    }
}

/// Result of a size-capped copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    /// The whole source was copied
    Complete(u64),
    /// The source holds at least the maximum number of bytes
    LimitReached,
}

/// Copy `reader` into `writer`, stopping at `max_bytes`
///
/// A source of exactly `max_bytes` or more yields [`CopyOutcome::LimitReached`].
/// A limit of zero disables the cap.
pub fn copy_capped<R, W>(reader: &mut R, writer: &mut W, max_bytes: u64) -> io::Result<CopyOutcome>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    if max_bytes == 0 {
        return io::copy(reader, writer).map(CopyOutcome::Complete);
    }

    let copied = io::copy(&mut reader.take(max_bytes), writer)?;
    if copied == max_bytes {
        Ok(CopyOutcome::LimitReached)
    } else {
        Ok(CopyOutcome::Complete(copied))
    }
}
