use crate::archive::ArchiveStore;
use anyhow::{Context, anyhow};
use starbeam_engine::config::StarbeamConfig;
use starbeam_engine::protocol::BeamCommand;
use starbeam_engine::strategy::SelectorStrategy;
use starbeam_engine::tabs::{TabInfo, filter_tabs, join_payload, split_payload};
use starbeam_engine::transport::{BeamTransport, describe_outcome};
use starbeam_h::cdp::CdpClient;
use starbeam_h::transport::CdpTransport;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

/// Attach to the configured endpoint, or launch a browser on the target page.
async fn open_browser(config: &StarbeamConfig) -> anyhow::Result<CdpClient> {
    match &config.browser.endpoint {
        Some(endpoint) => CdpClient::connect(endpoint)
            .await
            .map_err(|e| anyhow!("{}", e)),
        None => {
            let client = CdpClient::launch(config.browser.visible)
                .await
                .map_err(|e| anyhow!("{}", e))?;
            client
                .open(&config.target.url)
                .await
                .map_err(|e| anyhow!("{}", e))?;
            Ok(client)
        }
    }
}

async fn close_browser(client: CdpClient) {
    if let Err(e) = client.close().await {
        tracing::warn!("Failed to close browser: {}", e);
    }
}

async fn candidate_tabs(
    client: &CdpClient,
    config: &StarbeamConfig,
) -> anyhow::Result<Vec<TabInfo>> {
    let tabs = client.tabs().await.map_err(|e| anyhow!("{}", e))?;
    Ok(filter_tabs(&tabs, &config.target.host))
}

pub async fn tabs(config: &StarbeamConfig) -> anyhow::Result<ExitCode> {
    let client = open_browser(config).await?;
    let tabs = candidate_tabs(&client, config).await;
    close_browser(client).await;

    let tabs = tabs?;
    if tabs.is_empty() {
        println!("No web tabs open.");
    }
    for tab in &tabs {
        let marker = if tab.active { "*" } else { " " };
        println!("{} {}\n    {}", marker, tab.title, tab.url);
    }
    Ok(ExitCode::SUCCESS)
}

pub async fn beam(
    config: &Arc<StarbeamConfig>,
    urls: Vec<String>,
    from_archive: bool,
) -> anyhow::Result<ExitCode> {
    let mut selection = urls;
    if from_archive {
        let store = ArchiveStore::new(config.archive.resolve_path());
        selection = store
            .load()
            .await
            .with_context(|| format!("reading {}", store.path().display()))?
            .archived_stars;
        if selection.is_empty() {
            println!("Archive is empty.");
            return Ok(ExitCode::FAILURE);
        }
    }

    let client = Arc::new(open_browser(config).await?);
    if selection.is_empty() {
        selection = match candidate_tabs(&client, config).await {
            Ok(tabs) => tabs.into_iter().map(|tab| tab.url).collect(),
            Err(e) => {
                release(client).await;
                return Err(e);
            }
        };
    }

    if selection.is_empty() {
        println!("Nothing to beam.");
        release(client).await;
        return Ok(ExitCode::FAILURE);
    }

    let payload = join_payload(&selection);
    info!("Beaming {} URLs", split_payload(&payload).len());

    let transport = CdpTransport::new(client.clone(), config.clone());
    let outcome = transport.send(BeamCommand::activate(payload)).await;
    println!("{}", describe_outcome(&outcome));
    drop(transport);
    release(client).await;

    match outcome {
        Ok(result) if result.is_success() => Ok(ExitCode::SUCCESS),
        _ => Ok(ExitCode::FAILURE),
    }
}

async fn release(client: Arc<CdpClient>) {
    if let Ok(client) = Arc::try_unwrap(client) {
        close_browser(client).await;
    }
}

pub async fn archive(config: &StarbeamConfig, urls: Vec<String>) -> anyhow::Result<ExitCode> {
    let selection = if urls.is_empty() {
        let client = open_browser(config).await?;
        let tabs = candidate_tabs(&client, config).await;
        close_browser(client).await;
        tabs?.into_iter().map(|tab| tab.url).collect()
    } else {
        urls
    };

    let store = ArchiveStore::new(config.archive.resolve_path());
    let archive = store.save(&selection).await.map_err(|e| {
        anyhow!("{} [{}] ({})", e, e.code(), e.recovery_hint())
    })?;
    println!(
        "Archived {} URLs to {}",
        archive.archived_stars.len(),
        store.path().display()
    );
    Ok(ExitCode::SUCCESS)
}

fn print_strategy(name: &str, strategy: &SelectorStrategy) {
    for entry in strategy.entries() {
        println!(
            "{:<14} {:<10} {:<9} {:<4} {}",
            name,
            entry.kind,
            entry.mode.map(|m| m.to_string()).unwrap_or_else(|| "-".into()),
            entry.lang.as_deref().unwrap_or("-"),
            entry.value
        );
    }
}

pub fn selectors(config: &StarbeamConfig) {
    println!("{:<14} {:<10} {:<9} {:<4} VALUE", "STRATEGY", "KIND", "MODE", "LANG");
    print_strategy("target_input", &config.selectors.target_input);
    print_strategy("menu_trigger", &config.selectors.menu_trigger);
    print_strategy("option", &config.selectors.option);
}
