//! Lock-aware eviction of cached files
//!
//! Files are only deleted after a non-blocking exclusive lock was granted
//! on them. A file in use by a reader or writer is skipped and left for a
//! later pass; skipping is never an error.

use crate::cache::dir::{CacheDir, CacheEntry};
use crate::cache::lock;
use crate::error::CacheResult;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of a prune or clear pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionReport {
    /// Number of cached files found
    pub scanned: usize,
    /// Number of files deleted
    pub deleted: usize,
    /// Number of files left in place because they were in use or vanished
    pub skipped: usize,
    /// Cache size before the pass
    pub bytes_before: u64,
    /// Bytes actually freed
    pub bytes_freed: u64,
    /// Abandoned temporary files removed by `clear`
    pub temp_removed: usize,
}

impl EvictionReport {
    /// Cache size after the pass
    pub fn bytes_after(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_freed)
    }
}

/// Delete least recently accessed files until the cache fits `max_bytes`
///
/// The running total is reduced by every file visited, whether or not its
/// deletion succeeded, so files in use only shift the work to the next
/// pass instead of deleting more recent files now.
pub fn prune(dir: &CacheDir, max_bytes: u64) -> CacheResult<EvictionReport> {
    let start = Instant::now();
    let entries = dir.entries_by_access()?;

    let mut report = EvictionReport {
        scanned: entries.len(),
        bytes_before: entries.iter().map(|e| e.size).sum(),
        ..Default::default()
    };

    if report.bytes_before <= max_bytes {
        debug!(
            size_bytes = report.bytes_before,
            limit_bytes = max_bytes,
            "Image cache under limit, nothing to prune"
        );
        return Ok(report);
    }

    let mut total = report.bytes_before;
    for entry in &entries {
        if total <= max_bytes {
            break;
        }
        total = total.saturating_sub(entry.size);
        record(&mut report, entry, try_delete(entry));
    }

    info!(
        deleted = report.deleted,
        skipped = report.skipped,
        bytes_freed = report.bytes_freed,
        limit_bytes = max_bytes,
        duration_ms = start.elapsed().as_millis() as u64,
        "Pruned image cache"
    );
    Ok(report)
}

/// Delete every cached file that is not in use
pub fn clear(dir: &CacheDir) -> CacheResult<EvictionReport> {
    let entries = dir.entries()?;

    let mut report = EvictionReport {
        scanned: entries.len(),
        bytes_before: entries.iter().map(|e| e.size).sum(),
        ..Default::default()
    };

    for entry in &entries {
        record(&mut report, entry, try_delete(entry));
    }

    // Writers hold their temp file locked until it is published
    for temp in dir.temp_files()? {
        if try_delete(&temp) {
            report.temp_removed += 1;
        }
    }

    info!(
        deleted = report.deleted,
        skipped = report.skipped,
        bytes_freed = report.bytes_freed,
        temp_removed = report.temp_removed,
        "Cleared image cache"
    );
    Ok(report)
}

fn record(report: &mut EvictionReport, entry: &CacheEntry, deleted: bool) {
    if deleted {
        report.deleted += 1;
        report.bytes_freed += entry.size;
    } else {
        report.skipped += 1;
    }
}

/// Delete a cached file unless another handle holds a lock on it
fn try_delete(entry: &CacheEntry) -> bool {
    match delete_unlocked(entry) {
        Ok(true) => {
            debug!(path = %entry.path.display(), "Evicted cached file");
            true
        }
        Ok(false) => {
            debug!(path = %entry.path.display(), "Cached file in use, skipping");
            false
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(path = %entry.path.display(), error = %e, "Failed to evict cached file");
            false
        }
    }
}

fn delete_unlocked(entry: &CacheEntry) -> io::Result<bool> {
    let file = File::open(&entry.path)?;
    delete_if_unlocked(&file, &entry.path)
}

/// Delete `path` if no other handle holds a lock on `file` and `path`
/// still names that file
fn delete_if_unlocked(file: &File, path: &Path) -> io::Result<bool> {
    if !lock::try_lock_exclusive(file)? {
        return Ok(false);
    }
    // The file may have been replaced by a new, locked one since it was opened
    if !lock::is_linked_at(file, path) {
        return Ok(false);
    }
    fs::remove_file(path)?;
    Ok(true)
}
