//! Watch command - prune periodically until interrupted

use super::{blocking, prune::summary};
use crate::cache::{format_bytes, ImageCache};
use crate::cli::args::WatchArgs;
use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use crate::ui::{self, UiContext};
use std::time::Duration;
use tokio::signal;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

/// Execute the watch command
pub async fn execute(args: WatchArgs, config: &Config) -> CacheResult<()> {
    let ctx = UiContext::detect();
    let secs = args.interval.unwrap_or(config.watch.interval_secs);
    if secs == 0 {
        return Err(CacheError::User(
            "Watch interval must be at least 1 second".to_string(),
        ));
    }

    let cache = ImageCache::from_config(config);
    ui::step_info(
        &ctx,
        &format!(
            "Pruning {} to {} every {}s, press Ctrl-C to stop",
            cache.dir().path().display(),
            format_bytes(cache.max_size()),
            secs
        ),
    );

    let mut ticker = interval(Duration::from_secs(secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let worker = cache.clone();
                match blocking(move || worker.prune()).await {
                    Ok(report) => info!("{}", summary(&report)),
                    Err(e) => warn!("Prune pass failed: {}", e),
                }
            }
            result = signal::ctrl_c() => {
                result.map_err(|e| CacheError::io("listening for Ctrl-C", e))?;
                break;
            }
        }
    }

    ui::step_ok(&ctx, "Stopped watching");
    Ok(())
}
