//! runtask - fetch and cache server jars and plugins
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use runtask::cli::{Cli, Commands};
use runtask::config::{Config, ConfigManager, ConfigOverrides, ResolverConfig};
use runtask::error::RunTaskResult;
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

async fn run() -> RunTaskResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    debug!("Loaded configuration from {}", config_manager.path().display());

    let overrides = ConfigOverrides {
        cache_root: cli.cache_dir.clone(),
        offline: cli.offline,
        refresh: cli.refresh,
        recheck_interval: cli.recheck_interval.clone(),
    };
    let resolved = ResolverConfig::from_config(&config, &overrides)?;

    match cli.command {
        Commands::Resolve(args) => runtask::cli::commands::resolve(args, &resolved).await,
        Commands::Cache(args) => runtask::cli::commands::cache(args, &resolved).await,
        Commands::Config(args) => {
            runtask::cli::commands::config(args, &config_manager, &config, &resolved).await
        }
    }
}

/// 0 = warn, 1 = info, 2+ = debug; RUST_LOG wins when set
fn init_logging(verbose: u8, config: &Config) {
    let default = match verbose {
        0 => "runtask=warn",
        1 => "runtask=info",
        _ => "runtask=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
