use serde::{Deserialize, Serialize};
use starbeam_common::strategy::{SelectorStrategy, builtin};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StarbeamConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            wait_timeout_ms: default_wait_timeout_ms(),
        }
    }
}

impl EngineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_settle_delay_ms() -> u64 {
    500
}

fn default_wait_timeout_ms() -> u64 {
    5000
}

/// Strategies for the three controls on the path to the URL input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    #[serde(default = "default_target_input")]
    pub target_input: SelectorStrategy,
    #[serde(default = "default_menu_trigger")]
    pub menu_trigger: SelectorStrategy,
    #[serde(default = "default_option")]
    pub option: SelectorStrategy,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            target_input: default_target_input(),
            menu_trigger: default_menu_trigger(),
            option: default_option(),
        }
    }
}

fn default_target_input() -> SelectorStrategy {
    builtin::target_input()
}

fn default_menu_trigger() -> SelectorStrategy {
    builtin::menu_trigger()
}

fn default_option() -> SelectorStrategy {
    builtin::option()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Host of the application that receives beams.
    #[serde(default = "default_target_host")]
    pub host: String,
    /// Page opened when the browser is launched rather than attached to.
    #[serde(default = "default_target_url")]
    pub url: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            host: default_target_host(),
            url: default_target_url(),
        }
    }
}

fn default_target_host() -> String {
    "notebooklm.google.com".to_string()
}

fn default_target_url() -> String {
    "https://notebooklm.google.com/".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// DevTools endpoint of an already running Chrome, e.g. `http://127.0.0.1:9222`.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub visible: bool,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_eval_timeout_ms")]
    pub eval_timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            visible: false,
            connect_timeout_ms: default_connect_timeout_ms(),
            eval_timeout_ms: default_eval_timeout_ms(),
        }
    }
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_eval_timeout_ms() -> u64 {
    10000
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl ArchiveConfig {
    pub fn resolve_path(&self) -> PathBuf {
        if let Some(path) = &self.path {
            return path.clone();
        }
        match dirs::home_dir() {
            Some(home) => home.join(".starbeam").join("archive.json"),
            None => PathBuf::from("./starbeam-archive.json"),
        }
    }
}
