//! imcache - Disk-backed image cache
//!
//! Fetches remote and cloud-stored images once, keeps them in a local
//! cache directory, and coordinates concurrent worker processes through
//! advisory file locks.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod storage;
pub mod ui;

pub use error::{CacheError, CacheResult};
