//! Warm command - cache every image listed in a manifest

use super::blocking;
use crate::cache::{ImageCache, ImageDescriptor, ImageId, Origin};
use crate::cli::args::WarmArgs;
use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use crate::ui::{self, BatchProgress, UiContext};
use tokio::fs;
use tracing::warn;

/// A manifest line that could not be turned into an image descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestError {
    pub line: usize,
    pub reason: String,
}

/// Execute the warm command
pub async fn execute(args: WarmArgs, config: &Config) -> CacheResult<()> {
    let ctx = UiContext::detect();
    let content = fs::read_to_string(&args.manifest).await.map_err(|e| {
        CacheError::io(format!("reading manifest {}", args.manifest.display()), e)
    })?;

    let (images, invalid) = parse_manifest(&content);
    for err in &invalid {
        ui::step_error_detail(&ctx, &format!("Line {}", err.line), &err.reason);
    }

    if images.is_empty() {
        ui::step_info(&ctx, "No images to warm");
        return Ok(());
    }

    let cache = ImageCache::from_config(config);
    let progress = BatchProgress::new(&ctx, "Warming", images.len() as u64);
    let mut failed = Vec::new();
    let mut cached = 0usize;

    for image in images {
        progress.start_item(image.id.as_str());
        let worker = cache.clone();
        let id = image.id.clone();
        let result = blocking(move || worker.with_image(&image, |_, _| ())).await;
        match result {
            Ok(()) => cached += 1,
            Err(e) => {
                warn!("Failed to warm image {}: {}", id, e);
                failed.push((id, e));
            }
        }
        progress.inc();
    }
    progress.finish();

    for (id, err) in &failed {
        ui::step_error_detail(&ctx, &format!("Image {}", id), &err.to_string());
    }

    if failed.is_empty() && invalid.is_empty() {
        ui::outro_success(&ctx, &format!("Warmed {} image(s)", cached));
    } else {
        ui::outro_warn(
            &ctx,
            &format!(
                "Warmed {} image(s), {} failed",
                cached,
                failed.len() + invalid.len()
            ),
        );
    }

    Ok(())
}

/// Parse manifest lines of the form `id,origin,location`
///
/// Blank lines and lines starting with `#` are ignored. The location is
/// everything after the second comma.
pub fn parse_manifest(content: &str) -> (Vec<ImageDescriptor>, Vec<ManifestError>) {
    let mut images = Vec::new();
    let mut invalid = Vec::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_line(line) {
            Ok(image) => images.push(image),
            Err(reason) => invalid.push(ManifestError {
                line: idx + 1,
                reason,
            }),
        }
    }

    (images, invalid)
}

fn parse_line(line: &str) -> Result<ImageDescriptor, String> {
    let mut fields = line.splitn(3, ',').map(str::trim);
    let (Some(id), Some(origin), Some(location)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err("expected id,origin,location".to_string());
    };
    if location.is_empty() {
        return Err("missing location".to_string());
    }

    let id = ImageId::new(id).map_err(|e| e.to_string())?;
    let origin: Origin = origin.parse().map_err(|e: CacheError| e.to_string())?;
    Ok(ImageDescriptor::new(id, location, origin))
}
