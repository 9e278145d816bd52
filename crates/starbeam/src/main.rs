mod archive;
mod commands;

use clap::{Parser, Subcommand};
use starbeam_engine::config::{ConfigLoader, StarbeamConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "starbeam", version, about = "Beam open tabs into a notebook as sources")]
struct Args {
    /// Configuration file (defaults to ./starbeam.yaml, then ~/.starbeam/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// DevTools endpoint of a running Chrome, e.g. http://127.0.0.1:9222
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Launch the browser in visible mode (ignored with --endpoint)
    #[arg(long, global = true)]
    visible: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the tabs that would be beamed
    Tabs,
    /// Send URLs to the notebook as sources
    Beam {
        /// URL to beam (repeatable). Defaults to every open web tab.
        #[arg(long = "url")]
        urls: Vec<String>,
        /// Beam the archived selection instead of open tabs
        #[arg(long, conflicts_with = "urls")]
        from_archive: bool,
    },
    /// Save a URL selection for later
    Archive {
        /// URL to archive (repeatable). Defaults to every open web tab.
        #[arg(long = "url")]
        urls: Vec<String>,
    },
    /// Show the configured selector strategies
    Selectors,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = Arc::new(load_config(&args).await?);

    match args.command {
        Command::Tabs => commands::tabs(&config).await,
        Command::Beam { urls, from_archive } => commands::beam(&config, urls, from_archive).await,
        Command::Archive { urls } => commands::archive(&config, urls).await,
        Command::Selectors => {
            commands::selectors(&config);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn load_config(args: &Args) -> anyhow::Result<StarbeamConfig> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from(path).await?,
        None => ConfigLoader::load_default().await?,
    };
    if let Some(endpoint) = &args.endpoint {
        config.browser.endpoint = Some(endpoint.clone());
    }
    if args.visible {
        config.browser.visible = true;
    }
    Ok(config)
}
