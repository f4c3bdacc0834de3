// src/main.rs

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use mdapi::Config;
use mdapi::repository::{BodhiCatalog, build_sources};
use mdapi::Synchronizer;
use std::process::ExitCode;
use tracing::{error, info};

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path).context("Failed to load configuration"),
        None => Ok(Config::default()),
    }
}

fn init_logging(config: &Config) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();
}

fn cmd_database(config: Config) -> Result<ExitCode> {
    let catalog = BodhiCatalog::new(&config.upstream.bodhi_url, config.http_timeout())?;
    let sources = build_sources(&catalog, &config.upstream).context("Failed to build source list")?;
    info!("{} repositories to synchronize", sources.len());

    let synchronizer = Synchronizer::from_config(config)?;
    let outcomes = synchronizer.sync_all(&sources);

    let failed: Vec<_> = outcomes
        .iter()
        .filter(|o| o.result.is_err())
        .map(|o| o.label.as_str())
        .collect();
    if failed.is_empty() {
        info!("All {} repositories synchronized", outcomes.len());
        Ok(ExitCode::SUCCESS)
    } else {
        error!("{} repositories failed: {}", failed.len(), failed.join(", "));
        Ok(ExitCode::FAILURE)
    }
}

fn cmd_branches(config: &Config) -> Result<ExitCode> {
    let catalog = BodhiCatalog::new(&config.upstream.bodhi_url, config.http_timeout())?;
    for source in build_sources(&catalog, &config.upstream)? {
        println!("{}\t{}", source.label, source.url);
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(feature = "server")]
fn cmd_serve(config: Config) -> Result<ExitCode> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(mdapi::server::run_server(config))?;
    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    init_logging(&config);

    match cli.command {
        Commands::Database => cmd_database(config),
        #[cfg(feature = "server")]
        Commands::Serve => cmd_serve(config),
        Commands::Branches => cmd_branches(&config),
    }
}
