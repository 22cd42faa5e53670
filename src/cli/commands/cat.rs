//! Cat command - stream an image to stdout

use super::{blocking, fetch::descriptor};
use crate::cache::ImageCache;
use crate::cli::args::CatArgs;
use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use std::io::{self, Write};
use tracing::debug;

/// Execute the cat command
pub async fn execute(args: CatArgs, config: &Config) -> CacheResult<()> {
    let cache = ImageCache::from_config(config);
    let image = descriptor(args.image)?;

    let written = blocking(move || {
        let mut stream = cache.open_stream(&image)?;
        let mut stdout = io::stdout().lock();
        let written = io::copy(&mut stream, &mut stdout)
            .and_then(|n| stdout.flush().map(|()| n))
            .map_err(|e| CacheError::io(format!("streaming image {}", image.id), e))?;
        Ok(written)
    })
    .await?;

    debug!("Wrote {} bytes to stdout", written);
    Ok(())
}
