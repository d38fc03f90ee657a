//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// getpack - declarative external resources
///
/// Fetches archives, executables and PyPI packages declared in the config
/// file into a per-user cache, deploying each version once even when many
/// processes ask for it at the same time.
#[derive(Parser, Debug)]
#[command(name = "getpack")]
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
    #[arg(short, long, global = true, env = "GETPACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache root, overriding cache.base_dir
    #[arg(long, global = true, env = "GETPACK_BASE_DIR")]
    pub base_dir: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Make declared resources available, deploying them if needed
    Provide(ProvideArgs),

    /// Remove resources from the cache
    Cleanup(CleanupArgs),

    /// List cached versions of a resource
    Versions(VersionsArgs),

    /// Print the download URL the package index resolves for a release
    Resolve(ResolveArgs),

    /// Run a resource's executable
    Run(RunArgs),

    /// Show or edit configuration
    Config(ConfigArgs),
}

/// Arguments for the provide command
#[derive(Parser, Debug)]
pub struct ProvideArgs {
    /// Resources to provide (all declared resources if omitted)
    pub names: Vec<String>,

    /// Redeploy even if the version is already cached
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for the cleanup command
#[derive(Parser, Debug)]
pub struct CleanupArgs {
    /// Resources to remove
    #[arg(required_unless_present = "all")]
    pub names: Vec<String>,

    /// Remove every declared resource
    #[arg(short, long, conflicts_with = "names")]
    pub all: bool,
}

/// Arguments for the versions command
#[derive(Parser, Debug)]
pub struct VersionsArgs {
    /// Resource name
    pub name: String,

    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the resolve command
#[derive(Parser, Debug)]
pub struct ResolveArgs {
    /// Package name on the index
    pub name: String,

    /// Release version
    #[arg(id = "release_version", value_name = "VERSION")]
    pub version: String,

    /// Print the archive filename instead of the URL
    #[arg(long)]
    pub filename: bool,
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Resource whose executable to run
    pub name: String,

    /// Arguments passed to the executable (after --)
    #[arg(last = true)]
    pub args: Vec<String>,
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

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., cache.base_dir)
        key: String,
        /// Value to set
        value: String,
    },
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}
