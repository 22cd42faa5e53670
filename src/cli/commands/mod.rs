//! CLI command implementations

pub mod cat;
pub mod clear;
pub mod config;
pub mod fetch;
pub mod list;
pub mod prune;
pub mod warm;
pub mod watch;

pub use cat::execute as cat;
pub use clear::execute as clear;
pub use config::execute as config;
pub use fetch::execute as fetch;
pub use list::execute as list;
pub use prune::execute as prune;
pub use warm::execute as warm;
pub use watch::execute as watch;

use crate::error::{CacheError, CacheResult};

/// Run a blocking cache operation off the async runtime
pub(crate) async fn blocking<T, F>(f: F) -> CacheResult<T>
where
    F: FnOnce() -> CacheResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CacheError::Internal(format!("Cache task failed: {}", e)))?
}
