//! Disk-backed image cache
//!
//! Caches the bytes of remote and cloud-stored images in a flat directory,
//! one file per image id. Worker processes coordinate only through
//! advisory locks on those files; there is no shared in-memory state.
//!
//! # File States
//!
//! | State | Lock held | Description |
//! |-------|-----------|-------------|
//! | Absent | none | Not cached; the next acquire fetches it |
//! | Writing | exclusive | Being populated by exactly one worker |
//! | Ready | shared (while used) | Complete, readable by many workers |
//!
//! Eviction and use-once release delete a file only when a non-blocking
//! exclusive lock is granted, so a file is never removed while in use.

pub mod dir;
pub mod evict;
pub mod fetch;
pub mod image;
pub mod lock;
pub mod usage;

pub use dir::{CacheDir, CacheEntry};
pub use evict::EvictionReport;
pub use fetch::{CachedImage, HandleKind, ImageCache, MAX_ATTEMPTS};
pub use image::{ImageDescriptor, ImageId, Origin};
pub use usage::{format_bytes, CacheSizeStatus};
