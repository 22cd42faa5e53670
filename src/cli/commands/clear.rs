//! Clear command - delete every cached image not in use

use super::{blocking, prune::summary};
use crate::cache::ImageCache;
use crate::cli::args::ClearArgs;
use crate::config::Config;
use crate::error::CacheResult;
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the clear command
pub async fn execute(args: ClearArgs, config: &Config) -> CacheResult<()> {
    let ctx = UiContext::detect().with_auto_yes(args.yes);
    let cache = ImageCache::from_config(config);

    let prompt = format!("Delete all cached images in {}?", cache.dir().path().display());
    if !ui::confirm(&ctx, &prompt, false).await? {
        ui::step_info(&ctx, "Aborted, nothing deleted (use --yes to skip confirmation)");
        return Ok(());
    }

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start("Clearing image cache...");

    let report = match blocking(move || cache.clear()).await {
        Ok(report) => report,
        Err(e) => {
            spinner.stop_error("Clear failed");
            return Err(e);
        }
    };

    spinner.stop(&summary(&report));
    if report.temp_removed > 0 {
        ui::step_info(
            &ctx,
            &format!("Removed {} abandoned partial download(s)", report.temp_removed),
        );
    }
    if report.skipped > 0 {
        ui::step_warn_hint(
            &ctx,
            &format!("{} image(s) in use were kept", report.skipped),
            "run clear again once workers are idle",
        );
    }

    Ok(())
}
