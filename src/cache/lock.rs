//! Advisory whole-file locks
//!
//! Locks are `flock(2)` locks taken through [`fs2::FileExt`]. They belong to
//! the open file description, so two handles opened separately on the same
//! path contend even inside one process, and locking a handle that already
//! holds a lock converts it (exclusive to shared and back). Closing the
//! handle releases the lock.

use fs2::FileExt;
use std::fs::{self, File};
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

/// Take a shared lock, blocking while another handle holds it exclusively
pub fn lock_shared(file: &File) -> io::Result<()> {
    FileExt::lock_shared(file)
}

/// Take an exclusive lock, blocking while any other handle holds a lock
pub fn lock_exclusive(file: &File) -> io::Result<()> {
    FileExt::lock_exclusive(file)
}

/// Try to take an exclusive lock without blocking
///
/// Returns `Ok(false)` if another handle holds a lock on the file.
pub fn try_lock_exclusive(file: &File) -> io::Result<bool> {
    match FileExt::try_lock_exclusive(file) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
        Err(e) => Err(e),
    }
}

/// Whether `path` still names the file behind `file`
///
/// A lock only protects the inode it was taken on. Once granted, callers
/// check this before trusting or deleting `path`, since the file may have
/// been unlinked and replaced while they waited.
pub fn is_linked_at(file: &File, path: &Path) -> bool {
    match (file.metadata(), fs::metadata(path)) {
        (Ok(open), Ok(named)) => open.dev() == named.dev() && open.ino() == named.ino(),
        _ => false,
    }
}
