use crate::BoxError;
use chromiumoxide::handler::Handler;
use chromiumoxide::{Browser, BrowserConfig as ChromeConfig, Page};
use futures::StreamExt;
use starbeam_engine::tabs::{TabInfo, is_target_url};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

/// How often the tab list is re-read while waiting for a target to show up.
const TARGET_POLL: Duration = Duration::from_millis(250);

/// Bound on the per-tab visibility probe used by [`CdpClient::tabs`].
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

pub struct CdpClient {
    browser: Browser,
    handler_task: JoinHandle<()>,
    user_data_dir: Option<PathBuf>,
    cleanup_user_data_dir: bool,
    // Only a browser we started is ours to shut down.
    owned: bool,
}

impl CdpClient {
    pub async fn launch(visible: bool) -> Result<Self, BoxError> {
        let mut config_builder = ChromeConfig::builder();
        config_builder = config_builder.no_sandbox(); // Often needed in docker/CI/restricted envs
        let (user_data_dir, cleanup_user_data_dir) = resolve_user_data_dir()?;
        config_builder = config_builder.user_data_dir(&user_data_dir);

        if visible {
            tracing::info!("Launching browser in visible mode");
            config_builder = config_builder.with_head();
        } else {
            tracing::info!("Launching browser in headless mode");
        }

        if let Ok(chrome_bin) = std::env::var("CHROME_BIN") {
            tracing::info!("Using custom Chrome binary: {}", chrome_bin);
            config_builder = config_builder.chrome_executable(chrome_bin);
        }

        let (browser, handler) = Browser::launch(
            config_builder
                .build()
                .map_err(|e| format!("Failed to build browser config: {}", e))?,
        )
        .await
        .map_err(|e| format!("Failed to launch browser: {}", e))?;

        Ok(Self {
            browser,
            handler_task: spawn_handler(handler),
            user_data_dir: Some(user_data_dir),
            cleanup_user_data_dir,
            owned: true,
        })
    }

    /// Attach to a browser started with `--remote-debugging-port`.
    /// `endpoint` is its HTTP or WebSocket debugger URL.
    pub async fn connect(endpoint: &str) -> Result<Self, BoxError> {
        tracing::info!("Connecting to browser at {}", endpoint);
        let (browser, handler) = Browser::connect(endpoint)
            .await
            .map_err(|e| format!("Failed to connect to {}: {}", endpoint, e))?;

        Ok(Self {
            browser,
            handler_task: spawn_handler(handler),
            user_data_dir: None,
            cleanup_user_data_dir: false,
            owned: false,
        })
    }

    pub async fn pages(&self) -> Result<Vec<Page>, BoxError> {
        Ok(self
            .browser
            .pages()
            .await
            .map_err(|e| format!("Failed to list pages: {}", e))?)
    }

    /// Open tabs, in the order the browser reports them.
    pub async fn tabs(&self) -> Result<Vec<TabInfo>, BoxError> {
        let mut tabs = Vec::new();
        for page in self.pages().await? {
            tabs.push(tab_info(&page).await);
        }
        Ok(tabs)
    }

    /// First page whose URL belongs to `host`, polling for up to `wait`.
    /// Targets of a freshly attached browser are discovered asynchronously.
    pub async fn find_page(&self, host: &str, wait: Duration) -> Result<Option<Page>, BoxError> {
        let start = tokio::time::Instant::now();
        loop {
            for page in self.pages().await? {
                let url = page.url().await.ok().flatten().unwrap_or_default();
                if is_target_url(&url, host) {
                    tracing::debug!("Target page found: {}", url);
                    return Ok(Some(page));
                }
            }
            if start.elapsed() >= wait {
                return Ok(None);
            }
            tokio::time::sleep(TARGET_POLL).await;
        }
    }

    pub async fn open(&self, url: &str) -> Result<Page, BoxError> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| format!("Failed to open {}: {}", url, e))?;
        Ok(page)
    }

    pub async fn close(mut self) -> Result<(), BoxError> {
        if !self.owned {
            // Leave the user's browser running; just drop our connection.
            self.handler_task.abort();
            return Ok(());
        }

        self.browser
            .close()
            .await
            .map_err(|e| format!("Error closing browser: {}", e))?;
        self.handler_task
            .await
            .map_err(|e| format!("Error awaiting handler: {}", e))?;

        if self.cleanup_user_data_dir {
            if let Some(dir) = &self.user_data_dir {
                if let Err(e) = std::fs::remove_dir_all(dir) {
                    tracing::debug!("Failed to clean up user-data-dir {}: {}", dir.display(), e);
                }
            }
        }

        Ok(())
    }
}

fn spawn_handler(mut handler: Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if let Err(e) = h {
                tracing::error!("Browser handler error (ignoring): {}", e);
                continue;
            }
        }
        tracing::info!("Browser handler task ended");
    })
}

async fn tab_info(page: &Page) -> TabInfo {
    let url = page.url().await.ok().flatten().unwrap_or_default();
    let title = page.get_title().await.ok().flatten().unwrap_or_default();
    let active = tokio::time::timeout(
        PROBE_TIMEOUT,
        page.evaluate("document.visibilityState === 'visible'"),
    )
    .await
    .ok()
    .and_then(|r| r.ok())
    .and_then(|r| r.into_value::<bool>().ok())
    .unwrap_or(false);

    TabInfo {
        id: page.target_id().inner().clone(),
        url,
        title,
        active,
    }
}

fn resolve_user_data_dir() -> Result<(PathBuf, bool), BoxError> {
    if let Ok(dir) = std::env::var("STARBEAM_USER_DATA_DIR") {
        let path = PathBuf::from(dir);
        std::fs::create_dir_all(&path)?;
        tracing::info!(
            "Using user data dir from STARBEAM_USER_DATA_DIR: {}",
            path.display()
        );
        return Ok((path, false));
    }

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("System clock error: {}", e))?
        .as_nanos();
    let unique = format!("starbeam-chromium-profile-{}-{}", std::process::id(), nanos);
    let path = std::env::temp_dir().join(unique);
    std::fs::create_dir_all(&path)?;
    tracing::info!("Using isolated user data dir: {}", path.display());
    Ok((path, true))
}
