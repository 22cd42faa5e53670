//! Prune command - evict least recently used images

use super::blocking;
use crate::cache::{format_bytes, EvictionReport, ImageCache};
use crate::cli::args::PruneArgs;
use crate::config::Config;
use crate::error::CacheResult;
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the prune command
pub async fn execute(args: PruneArgs, config: &Config) -> CacheResult<()> {
    let ctx = UiContext::detect();
    let cache = ImageCache::from_config(config);
    let budget = args.max_size.unwrap_or(cache.max_size());

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Pruning image cache to {}...", format_bytes(budget)));

    let report = match blocking(move || cache.prune_to(budget)).await {
        Ok(report) => report,
        Err(e) => {
            spinner.stop_error("Prune failed");
            return Err(e);
        }
    };

    spinner.stop(&summary(&report));
    if report.skipped > 0 {
        ui::step_warn_hint(
            &ctx,
            &format!("{} image(s) in use were kept", report.skipped),
            "they will be evicted by a later prune",
        );
    }

    Ok(())
}

/// One-line description of an eviction pass
pub(crate) fn summary(report: &EvictionReport) -> String {
    if report.deleted == 0 {
        return format!(
            "Nothing evicted, cache holds {}",
            format_bytes(report.bytes_after())
        );
    }
    format!(
        "Evicted {} image(s), freed {} ({} remaining)",
        report.deleted,
        format_bytes(report.bytes_freed),
        format_bytes(report.bytes_after())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_mentions_freed_bytes() {
        let report = EvictionReport {
            scanned: 3,
            deleted: 1,
            skipped: 0,
            bytes_before: 3072,
            bytes_freed: 1024,
            temp_removed: 0,
        };
        assert_eq!(
            summary(&report),
            "Evicted 1 image(s), freed 1.0 KB (2.0 KB remaining)"
        );
    }

    #[test]
    fn summary_without_deletions() {
        let report = EvictionReport {
            bytes_before: 10,
            ..Default::default()
        };
        assert_eq!(summary(&report), "Nothing evicted, cache holds 10 B");
    }
}
