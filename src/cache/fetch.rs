//! Fetch coordination
//!
//! Resolves an image to a readable handle, populating the cache directory
//! from the storage backend when needed. All coordination between workers
//! happens through advisory locks on the cache files:
//!
//! - readers hold a shared lock for as long as they use a cached file
//! - the single writer of a new file holds an exclusive lock until the
//!   file is completely written, then downgrades it to shared
//! - deletion (use-once release, eviction) only happens under a
//!   non-blocking exclusive lock
//!
//! A new cache file is created under a hidden temporary name, locked, and
//! only then hard-linked to its final name, so no worker can ever observe
//! an unlocked, partially written file at `{cache_dir}/{id}`.

use crate::cache::dir::{CacheDir, TEMP_SUFFIX};
use crate::cache::evict::{self, EvictionReport};
use crate::cache::image::ImageDescriptor;
use crate::cache::lock;
use crate::config::{CacheConfig, Config};
use crate::error::{CacheError, CacheResult};
use crate::storage::{copy_capped, ByteStream, CopyOutcome, Source, StorageRegistry};
use std::fs::{self, File, FileTimes, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Number of attempts for populating a cache file from its backend
pub const MAX_ATTEMPTS: u32 = 2;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// How a handle refers to the image bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// A file in the cache directory, held with a shared lock
    Cached,
    /// The original file on a local filesystem, unlocked
    Direct,
}

/// An open image handle returned by [`ImageCache::acquire`]
///
/// Dropping the handle closes the file and releases its lock.
#[derive(Debug)]
pub struct CachedImage {
    path: PathBuf,
    file: File,
    kind: HandleKind,
}

impl CachedImage {
    /// Path of the file holding the image bytes
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The open file
    pub fn file(&self) -> &File {
        &self.file
    }

    /// Whether the handle refers to a cache file or the original file
    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    /// Whether the handle refers to a file in the cache directory
    pub fn is_cached(&self) -> bool {
        self.kind == HandleKind::Cached
    }

    /// Size of the image in bytes
    pub fn size(&self) -> CacheResult<u64> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| CacheError::io(format!("reading metadata of {}", self.path.display()), e))
    }
}

impl Read for CachedImage {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

/// Disk-backed image cache
#[derive(Debug, Clone)]
pub struct ImageCache {
    dir: CacheDir,
    storage: StorageRegistry,
    max_size: u64,
    max_image_size: u64,
}

impl ImageCache {
    /// Create a cache from its configuration and the storage disks it reads from
    pub fn new(config: &CacheConfig, storage: StorageRegistry) -> Self {
        Self {
            dir: CacheDir::new(config.path.clone()),
            storage,
            max_size: config.max_size,
            max_image_size: config.max_image_size,
        }
    }

    /// Create a cache with the storage disks declared in the configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.cache, StorageRegistry::from_config(&config.disks))
    }

    /// The cache directory
    pub fn dir(&self) -> &CacheDir {
        &self.dir
    }

    /// Configured total size budget in bytes
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Run `f` with the path of the image bytes, caching the image first
    /// if it is remote
    ///
    /// The file stays locked against eviction while `f` runs.
    pub fn with_image<R, F>(&self, image: &ImageDescriptor, f: F) -> CacheResult<R>
    where
        F: FnOnce(&ImageDescriptor, &Path) -> R,
    {
        let handle = self.acquire(image)?;
        let result = f(image, handle.path());
        self.release(handle, false);
        Ok(result)
    }

    /// Like [`with_image`](Self::with_image), but delete the cached copy
    /// afterwards unless another worker is using it
    pub fn with_image_once<R, F>(&self, image: &ImageDescriptor, f: F) -> CacheResult<R>
    where
        F: FnOnce(&ImageDescriptor, &Path) -> R,
    {
        let handle = self.acquire(image)?;
        let result = f(image, handle.path());
        self.release(handle, true);
        Ok(result)
    }

    /// Get a readable handle to the image bytes
    ///
    /// Cached files are returned with a shared lock held. Images readable
    /// in place (local files, local disks) are opened directly and never
    /// copied. Anything else is fetched into the cache exactly once, even
    /// when several workers ask for it at the same time.
    pub fn acquire(&self, image: &ImageDescriptor) -> CacheResult<CachedImage> {
        let cached_path = self.dir.cached_path(&image.id)?;

        loop {
            if let Some(handle) = self.open_cached(&cached_path)? {
                debug!("Image {} served from cache", image.id);
                return Ok(handle);
            }

            let source = self.storage.resolve(image)?;
            if let Source::Direct(path) = source {
                debug!("Image {} read in place at {}", image.id, path.display());
                return open_direct(path);
            }

            if let Some(handle) = self.cache_new(image, &source, &cached_path)? {
                return Ok(handle);
            }
            // Another worker created or removed the file meanwhile
            debug!("Lost race for image {}, retrying", image.id);
        }
    }

    /// Close a handle, deleting the cached file first if `use_once` is set
    /// and no other worker holds a lock on it
    pub fn release(&self, handle: CachedImage, use_once: bool) {
        if !use_once || !handle.is_cached() {
            return;
        }

        match lock::try_lock_exclusive(&handle.file) {
            Ok(true) => {
                if !lock::is_linked_at(&handle.file, &handle.path) {
                    return;
                }
                match fs::remove_file(&handle.path) {
                    Ok(()) => debug!("Deleted use-once file {}", handle.path.display()),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => warn!("Failed to delete {}: {}", handle.path.display(), e),
                }
            }
            Ok(false) => debug!(
                "{} is in use, leaving it for eviction",
                handle.path.display()
            ),
            Err(e) => warn!("Failed to lock {}: {}", handle.path.display(), e),
        }
    }

    /// Open a read stream of the image bytes without caching them
    ///
    /// A cached copy is preferred and marked as recently used; the stream
    /// then holds a shared lock until dropped.
    pub fn open_stream(&self, image: &ImageDescriptor) -> CacheResult<ByteStream> {
        let cached_path = self.dir.cached_path(&image.id)?;
        if let Some(handle) = self.open_cached(&cached_path)? {
            debug!("Streaming image {} from cache", image.id);
            return Ok(Box::new(handle.file));
        }

        let source = self.storage.resolve(image)?;
        debug!("Streaming image {} from {}", image.id, source.describe());
        source.open()
    }

    /// Delete least recently used files until the cache fits the
    /// configured budget
    pub fn prune(&self) -> CacheResult<EvictionReport> {
        self.prune_to(self.max_size)
    }

    /// Delete least recently used files until the cache fits `max_bytes`
    pub fn prune_to(&self, max_bytes: u64) -> CacheResult<EvictionReport> {
        evict::prune(&self.dir, max_bytes)
    }

    /// Delete every cached file that is not in use
    pub fn clear(&self) -> CacheResult<EvictionReport> {
        evict::clear(&self.dir)
    }

    /// Open an existing cache file with a shared lock
    ///
    /// Returns `None` if the file does not exist or was unlinked while
    /// waiting for the lock.
    fn open_cached(&self, path: &Path) -> CacheResult<Option<CachedImage>> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CacheError::io(
                    format!("opening cached file {}", path.display()),
                    e,
                ))
            }
        };

        // Blocks while the file is being written
        lock::lock_shared(&file)
            .map_err(|e| CacheError::io(format!("locking {}", path.display()), e))?;

        if !lock::is_linked_at(&file, path) {
            return Ok(None);
        }

        touch(&file, path);
        Ok(Some(CachedImage {
            path: path.to_path_buf(),
            file,
            kind: HandleKind::Cached,
        }))
    }

    /// Create, lock and populate a new cache file
    ///
    /// Returns `None` if another worker published the file first.
    fn cache_new(
        &self,
        image: &ImageDescriptor,
        source: &Source,
        cached_path: &Path,
    ) -> CacheResult<Option<CachedImage>> {
        self.dir.ensure_exists()?;

        let temp_path = self.temp_path(image);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .map_err(|e| CacheError::io(format!("creating {}", temp_path.display()), e))?;

        let published = lock::lock_exclusive(&file)
            .map_err(|e| CacheError::io(format!("locking {}", temp_path.display()), e))
            .and_then(|()| publish(&temp_path, cached_path));
        remove_quietly(&temp_path);
        if !published? {
            return Ok(None);
        }

        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.populate(image, source, &mut file) {
                Ok(bytes) => {
                    info!(
                        "Cached image {} ({} bytes) from {}",
                        image.id,
                        bytes,
                        source.describe()
                    );
                    break;
                }
                Err(e) if e.is_retryable() && attempts < MAX_ATTEMPTS => {
                    warn!(
                        "Attempt {}/{} to cache image {} failed: {}",
                        attempts, MAX_ATTEMPTS, image.id, e
                    );
                }
                Err(e) => {
                    remove_quietly(cached_path);
                    drop(file);
                    return Err(match e {
                        CacheError::TransferTooLarge { .. } => e,
                        e => CacheError::Fetch {
                            id: image.id.to_string(),
                            attempts,
                            source: Box::new(e),
                        },
                    });
                }
            }
        }

        // Let other workers in
        if let Err(e) = lock::lock_shared(&file) {
            remove_quietly(cached_path);
            return Err(CacheError::io(
                format!("downgrading lock on {}", cached_path.display()),
                e,
            ));
        }

        touch(&file, cached_path);
        Ok(Some(CachedImage {
            path: cached_path.to_path_buf(),
            file,
            kind: HandleKind::Cached,
        }))
    }

    /// Copy the image from its source into `file`, replacing any content
    /// from an earlier attempt
    fn populate(&self, image: &ImageDescriptor, source: &Source, file: &mut File) -> CacheResult<u64> {
        let context = |e| CacheError::io("resetting cache file", e);
        file.set_len(0).map_err(context)?;
        file.seek(SeekFrom::Start(0)).map_err(context)?;

        let mut reader = source.open()?;
        let outcome = copy_capped(&mut reader, file, self.max_image_size)
            .and_then(|outcome| file.flush().map(|()| outcome))
            .map_err(|e| CacheError::transfer(source.describe(), e))?;

        match outcome {
            CopyOutcome::Complete(bytes) => {
                file.seek(SeekFrom::Start(0)).map_err(context)?;
                Ok(bytes)
            }
            CopyOutcome::LimitReached => Err(CacheError::TransferTooLarge {
                id: image.id.to_string(),
                max_bytes: self.max_image_size,
            }),
        }
    }

    /// Unique hidden name for a file under construction
    fn temp_path(&self, image: &ImageDescriptor) -> PathBuf {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.dir
            .path()
            .join(format!(
                ".{}.{}-{}{}",
                image.id,
                std::process::id(),
                n,
                TEMP_SUFFIX
            ))
    }
}

/// Link the locked temp file to its final name
///
/// Returns `false` if the final name already exists.
fn publish(temp_path: &Path, cached_path: &Path) -> CacheResult<bool> {
    match fs::hard_link(temp_path, cached_path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(CacheError::io(
            format!("publishing {}", cached_path.display()),
            e,
        )),
    }
}

fn open_direct(path: PathBuf) -> CacheResult<CachedImage> {
    match File::open(&path) {
        Ok(file) => Ok(CachedImage {
            path,
            file,
            kind: HandleKind::Direct,
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(CacheError::PathNotFound(path)),
        Err(e) => Err(CacheError::io(format!("opening {}", path.display()), e)),
    }
}

/// Mark a cache file as recently used
fn touch(file: &File, path: &Path) {
    let now = SystemTime::now();
    if let Err(e) = file.set_times(FileTimes::new().set_accessed(now).set_modified(now)) {
        warn!("Failed to update timestamps of {}: {}", path.display(), e);
    }
}

fn remove_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}
