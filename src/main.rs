//! getpack - declarative external resources
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use getpack::cli::args::{ConfigAction, ConfigArgs};
use getpack::cli::{commands, Cli, Commands};
use getpack::config::{Config, ConfigManager};
use getpack::error::GetpackResult;
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
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> GetpackResult<()> {
    let cli = Cli::parse();

    // Load configuration
    let manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };

    // Init must work even when the existing file does not parse
    if let Commands::Config(ConfigArgs {
        action: Some(ConfigAction::Init { force }),
    }) = cli.command
    {
        init_logging(cli.verbose, "text");
        let args = ConfigArgs {
            action: Some(ConfigAction::Init { force }),
        };
        return commands::config(args, &manager, &Config::default()).await;
    }

    let mut config = manager.load().await?;

    init_logging(cli.verbose, &config.general.log_format);
    debug!("Using config {}", manager.path().display());

    if let Some(base_dir) = cli.base_dir {
        config.cache.base_dir = base_dir;
    }
    debug!("Cache root {}", config.cache.base_dir.display());

    // Dispatch to command
    match cli.command {
        Commands::Provide(args) => commands::provide(args, &config).await,
        Commands::Cleanup(args) => commands::cleanup(args, &config).await,
        Commands::Versions(args) => commands::versions(args, &config).await,
        Commands::Resolve(args) => commands::resolve(args, &config).await,
        Commands::Run(args) => commands::run(args, &config).await,
        Commands::Config(args) => commands::config(args, &manager, &config).await,
    }
}

/// Logs go to stderr: 0 = warn, 1 = info, 2+ = debug
fn init_logging(verbose: u8, format: &str) {
    let filter = match verbose {
        0 => EnvFilter::new("getpack=warn"),
        1 => EnvFilter::new("getpack=info"),
        _ => EnvFilter::new("getpack=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    if format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
