//! Fetch command - make an image available locally

use super::blocking;
use crate::cache::{format_bytes, ImageCache, ImageDescriptor, ImageId};
use crate::cli::args::{FetchArgs, ImageArgs};
use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use crate::ui::{self, UiContext};
use std::fs;
use std::path::{Path, PathBuf};

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> CacheResult<()> {
    let ctx = UiContext::detect();
    let cache = ImageCache::from_config(config);
    let image = descriptor(args.image)?;
    let id = image.id.clone();
    let once = args.once;

    let cache_root = cache.dir().path().to_path_buf();
    let (path, size) = blocking(move || {
        let inspect = |_: &ImageDescriptor, path: &Path| stat(path);
        if once {
            cache.with_image_once(&image, inspect)?
        } else {
            cache.with_image(&image, inspect)?
        }
    })
    .await?;

    let (detail, usable) = outcome(&path, &cache_root, once);
    ui::step_ok_detail(
        &ctx,
        &format!("Image {} available, {}", id, format_bytes(size)),
        detail,
    );
    // A released use-once copy may already be gone
    if let Some(path) = usable {
        println!("{}", path.display());
    }

    Ok(())
}

/// Describe where the image came from and the path still valid afterwards
fn outcome<'a>(
    path: &'a Path,
    cache_root: &Path,
    once: bool,
) -> (&'static str, Option<&'a Path>) {
    match (path.starts_with(cache_root), once) {
        (true, true) => ("cached, released", None),
        (true, false) => ("cached", Some(path)),
        (false, _) => ("read in place", Some(path)),
    }
}

/// Build an image descriptor from command line arguments
pub(crate) fn descriptor(args: ImageArgs) -> CacheResult<ImageDescriptor> {
    let id = ImageId::new(args.id)?;
    Ok(ImageDescriptor::new(id, args.location, args.origin.into()))
}

fn stat(path: &Path) -> CacheResult<(PathBuf, u64)> {
    let meta = fs::metadata(path)
        .map_err(|e| CacheError::io(format!("reading metadata of {}", path.display()), e))?;
    Ok((path.to_path_buf(), meta.len()))
}
