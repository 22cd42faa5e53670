//! CLI argument definitions using clap derive

use crate::cache::Origin;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// imcache - Disk-backed image cache
///
/// Caches remote and cloud-stored images on local disk so that concurrent
/// workers fetch each image exactly once.
#[derive(Parser, Debug)]
#[command(name = "imcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "IMCACHE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Make an image available locally and print its path
    Fetch(FetchArgs),

    /// Write the bytes of an image to stdout without caching them
    Cat(CatArgs),

    /// Cache every image listed in a manifest file
    Warm(WarmArgs),

    /// List cached images
    List(ListArgs),

    /// Evict least recently used images until the cache fits its budget
    Prune(PruneArgs),

    /// Delete every cached image that is not in use
    Clear(ClearArgs),

    /// Prune periodically until interrupted
    Watch(WatchArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Image selection shared by fetch and cat
#[derive(Parser, Debug)]
pub struct ImageArgs {
    /// Image id, used as the cache file name
    pub id: String,

    /// URL, disk location (disk://path) or filesystem path of the image
    pub location: String,

    /// Where the image is stored
    #[arg(short, long, value_enum, default_value = "remote")]
    pub origin: OriginArg,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    #[command(flatten)]
    pub image: ImageArgs,

    /// Delete the cached copy afterwards unless another worker uses it
    #[arg(long)]
    pub once: bool,
}

/// Arguments for the cat command
#[derive(Parser, Debug)]
pub struct CatArgs {
    #[command(flatten)]
    pub image: ImageArgs,
}

/// Arguments for the warm command
#[derive(Parser, Debug)]
pub struct WarmArgs {
    /// Manifest file with one `id,origin,location` line per image
    pub manifest: PathBuf,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the prune command
#[derive(Parser, Debug)]
pub struct PruneArgs {
    /// Size budget in bytes (defaults to cache.max_size)
    #[arg(long)]
    pub max_size: Option<u64>,
}

/// Arguments for the clear command
#[derive(Parser, Debug)]
pub struct ClearArgs {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the watch command
#[derive(Parser, Debug)]
pub struct WatchArgs {
    /// Seconds between prune passes (defaults to watch.interval_secs)
    #[arg(short, long)]
    pub interval: Option<u64>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Image origin as accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OriginArg {
    /// Served over HTTP(S)
    Remote,
    /// Stored on a configured storage disk
    Disk,
    /// A file on the local filesystem
    Local,
}

impl From<OriginArg> for Origin {
    fn from(arg: OriginArg) -> Self {
        match arg {
            OriginArg::Remote => Origin::Remote,
            OriginArg::Disk => Origin::Disk,
            OriginArg::Local => Origin::Local,
        }
    }
}

/// Output format for list command
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_fetch() {
        let cli = Cli::parse_from([
            "imcache",
            "fetch",
            "42",
            "archive://2024/a.jpg",
            "--origin",
            "disk",
            "--once",
        ]);
        match cli.command {
            Commands::Fetch(args) => {
                assert_eq!(args.image.id, "42");
                assert_eq!(args.image.location, "archive://2024/a.jpg");
                assert_eq!(args.image.origin, OriginArg::Disk);
                assert!(args.once);
            }
            _ => panic!("expected Fetch command"),
        }
    }

    #[test]
    fn cli_fetch_defaults_to_remote() {
        let cli = Cli::parse_from(["imcache", "fetch", "1", "https://example.org/1.jpg"]);
        match cli.command {
            Commands::Fetch(args) => {
                assert_eq!(args.image.origin, OriginArg::Remote);
                assert!(!args.once);
            }
            _ => panic!("expected Fetch command"),
        }
    }

    #[test]
    fn cli_parses_prune_budget() {
        let cli = Cli::parse_from(["imcache", "prune", "--max-size", "1000"]);
        match cli.command {
            Commands::Prune(args) => assert_eq!(args.max_size, Some(1000)),
            _ => panic!("expected Prune command"),
        }
    }

    #[test]
    fn cli_parses_list_format() {
        let cli = Cli::parse_from(["imcache", "list", "--format", "json"]);
        match cli.command {
            Commands::List(args) => assert!(matches!(args.format, OutputFormat::Json)),
            _ => panic!("expected List command"),
        }
    }

    #[test]
    fn cli_parses_config_init_force() {
        let cli = Cli::parse_from(["imcache", "config", "init", "--force"]);
        match cli.command {
            Commands::Config(args) => {
                assert!(matches!(args.action, Some(ConfigAction::Init { force: true })))
            }
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn cli_rejects_unknown_origin() {
        let result = Cli::try_parse_from(["imcache", "fetch", "1", "x", "--origin", "ftp"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_verbose_levels() {
        let cli = Cli::parse_from(["imcache", "list"]);
        assert_eq!(cli.verbose, 0);

        let cli = Cli::parse_from(["imcache", "-v", "list"]);
        assert_eq!(cli.verbose, 1);

        let cli = Cli::parse_from(["imcache", "-vv", "list"]);
        assert_eq!(cli.verbose, 2);
    }
}
