//! imcache - Disk-backed image cache
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use imcache::cli::commands;
use imcache::cli::args::{ConfigAction, ConfigArgs};
use imcache::cli::{Cli, Commands};
use imcache::config::ConfigManager;
use imcache::error::CacheResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> CacheResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    // Init command must work even when the existing file is broken
    if let Commands::Config(ConfigArgs {
        action: Some(ConfigAction::Init { force }),
    }) = cli.command
    {
        init_logging(cli.verbose, false);
        return commands::config::init_config(&config_manager, force).await;
    }

    let config = config_manager.load().await?;
    init_logging(cli.verbose, config.general.log_format == "json");

    debug!("Using cache directory {}", config.cache.path.display());

    match cli.command {
        Commands::Fetch(args) => commands::fetch(args, &config).await,
        Commands::Cat(args) => commands::cat(args, &config).await,
        Commands::Warm(args) => commands::warm(args, &config).await,
        Commands::List(args) => commands::list(args, &config).await,
        Commands::Prune(args) => commands::prune(args, &config).await,
        Commands::Clear(args) => commands::clear(args, &config).await,
        Commands::Watch(args) => commands::watch(args, &config).await,
        Commands::Config(args) => commands::config(args, &config_manager, &config).await,
    }
}

/// Initialize logging: 0 = warn, 1 = info, 2+ = debug
fn init_logging(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::new("imcache=warn"),
        1 => EnvFilter::new("imcache=info"),
        _ => EnvFilter::new("imcache=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
