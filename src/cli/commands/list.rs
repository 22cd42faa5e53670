//! List command - show cached images

use super::blocking;
use crate::cache::{format_bytes, CacheEntry, CacheSizeStatus, ImageCache};
use crate::cli::args::{ListArgs, OutputFormat};
use crate::config::Config;
use crate::error::CacheResult;
use crate::ui::{self, UiContext};
use chrono::{DateTime, Local, Utc};
use console::style;
use serde::Serialize;

/// Execute the list command
pub async fn execute(args: ListArgs, config: &Config) -> CacheResult<()> {
    let cache = ImageCache::from_config(config);
    let limit = cache.max_size();
    let root = cache.dir().path().to_path_buf();

    let entries = blocking(move || cache.dir().entries_by_access()).await?;
    let total: u64 = entries.iter().map(|e| e.size).sum();

    match args.format {
        OutputFormat::Table => print_table(&entries, total, limit, &root.display().to_string()),
        OutputFormat::Json => print_json(&entries, total, limit)?,
        OutputFormat::Plain => print_plain(&entries),
    }

    Ok(())
}

fn print_table(entries: &[CacheEntry], total: u64, limit: u64, root: &str) {
    let ctx = UiContext::detect();

    if entries.is_empty() {
        ui::step_info(&ctx, &format!("Image cache is empty ({})", root));
        return;
    }

    ui::intro(&ctx, "Cached images");

    println!(
        "{:<40} {:>10} {:<20}",
        style("ID").bold(),
        style("SIZE").bold(),
        style("LAST ACCESS").bold()
    );
    println!("{}", "-".repeat(72));

    for entry in entries {
        let accessed: DateTime<Local> = entry.accessed.into();
        println!(
            "{:<40} {:>10} {:<20}",
            entry.name,
            format_bytes(entry.size),
            accessed.format("%Y-%m-%d %H:%M")
        );
    }

    let status = CacheSizeStatus::from_usage(total, limit);
    let usage = format!(
        "{} of {} ({:.0}%)",
        format_bytes(total),
        format_bytes(limit),
        CacheSizeStatus::percentage(total, limit)
    );
    let usage = match status {
        CacheSizeStatus::Ok => style(usage).green(),
        CacheSizeStatus::Warning => style(usage).yellow(),
        CacheSizeStatus::Exceeded => style(usage).red(),
    };

    println!();
    println!("{} image(s), {}", entries.len(), usage);
}

#[derive(Serialize)]
struct ListJson {
    total_bytes: u64,
    limit_bytes: u64,
    status: CacheSizeStatus,
    images: Vec<EntryJson>,
}

#[derive(Serialize)]
struct EntryJson {
    id: String,
    size: u64,
    accessed_at: String,
}

fn print_json(entries: &[CacheEntry], total: u64, limit: u64) -> CacheResult<()> {
    let list = ListJson {
        total_bytes: total,
        limit_bytes: limit,
        status: CacheSizeStatus::from_usage(total, limit),
        images: entries
            .iter()
            .map(|e| EntryJson {
                id: e.name.clone(),
                size: e.size,
                accessed_at: DateTime::<Utc>::from(e.accessed).to_rfc3339(),
            })
            .collect(),
    };

    println!("{}", serde_json::to_string_pretty(&list)?);
    Ok(())
}

fn print_plain(entries: &[CacheEntry]) {
    for entry in entries {
        println!("{}", entry.name);
    }
}
