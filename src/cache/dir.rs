//! Cache directory layout
//!
//! Every cached image is a single flat file named after its id directly
//! inside the cache directory.

use crate::cache::image::ImageId;
use crate::error::{CacheError, CacheResult};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// A regular file found in the cache directory
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Absolute path of the file
    pub path: PathBuf,
    /// File name (the image id)
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Last access time, falling back to modification time
    pub accessed: SystemTime,
}

/// Suffix of hidden files a writer populates before publishing them
pub(crate) const TEMP_SUFFIX: &str = ".part";

/// Handle to the cache root directory
#[derive(Debug, Clone)]
pub struct CacheDir {
    root: PathBuf,
}

impl CacheDir {
    /// Create a handle; the directory itself is created lazily
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory path
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Path of the cached copy of an image
    ///
    /// The id must be a single plain path component so the result always
    /// lies directly inside the cache directory.
    pub fn cached_path(&self, id: &ImageId) -> CacheResult<PathBuf> {
        let mut components = Path::new(id.as_str()).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == id.as_str() => {
                Ok(self.root.join(name))
            }
            _ => Err(CacheError::InvalidImageId(id.to_string())),
        }
    }

    /// Whether the root directory exists
    pub fn exists(&self) -> bool {
        self.root.is_dir()
    }

    /// Create the directory tree if it does not exist yet
    pub fn ensure_exists(&self) -> CacheResult<()> {
        if self.exists() {
            return Ok(());
        }

        match fs::create_dir_all(&self.root) {
            Ok(()) => Ok(()),
            // Lost a race against another worker creating the same tree
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && self.root.is_dir() => Ok(()),
            Err(e) => Err(CacheError::io(
                format!("creating cache directory {}", self.root.display()),
                e,
            )),
        }?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o755);
            if let Err(e) = fs::set_permissions(&self.root, perms) {
                debug!("Could not set permissions on {}: {}", self.root.display(), e);
            }
        }

        debug!("Created cache directory {}", self.root.display());
        Ok(())
    }

    /// List cached files, skipping hidden files and anything that is not
    /// a regular file
    ///
    /// Returns an empty list if the directory does not exist. Files that
    /// disappear while listing are skipped.
    pub fn entries(&self) -> CacheResult<Vec<CacheEntry>> {
        self.scan(|name| !name.starts_with('.'))
    }

    /// Temporary files left behind by writers that died before publishing
    /// their image
    pub fn temp_files(&self) -> CacheResult<Vec<CacheEntry>> {
        self.scan(|name| name.starts_with('.') && name.ends_with(TEMP_SUFFIX))
    }

    fn scan(&self, keep: impl Fn(&str) -> bool) -> CacheResult<Vec<CacheEntry>> {
        let reader = match fs::read_dir(&self.root) {
            Ok(reader) => reader,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CacheError::io(
                    format!("reading cache directory {}", self.root.display()),
                    e,
                ))
            }
        };

        let mut entries = Vec::new();
        for dirent in reader {
            let dirent = dirent.map_err(|e| CacheError::io("reading cache entry", e))?;
            let name = dirent.file_name().to_string_lossy().into_owned();
            if !keep(&name) {
                continue;
            }

            let metadata = match dirent.metadata() {
                Ok(m) => m,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(CacheError::io(
                        format!("reading metadata of {}", dirent.path().display()),
                        e,
                    ))
                }
            };
            if !metadata.is_file() {
                continue;
            }

            let accessed = metadata
                .accessed()
                .or_else(|_| metadata.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);

            entries.push(CacheEntry {
                path: dirent.path(),
                name,
                size: metadata.len(),
                accessed,
            });
        }

        Ok(entries)
    }

    /// Cached files ordered by access time, least recently used first
    pub fn entries_by_access(&self) -> CacheResult<Vec<CacheEntry>> {
        let mut entries = self.entries()?;
        entries.sort_by(|a, b| a.accessed.cmp(&b.accessed).then_with(|| a.name.cmp(&b.name)));
        Ok(entries)
    }
}
