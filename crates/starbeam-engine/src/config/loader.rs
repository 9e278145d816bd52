use super::schema::StarbeamConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. ./starbeam.yaml
    /// 2. ~/.starbeam/config.yaml
    /// 3. Built-in defaults
    pub async fn load_default() -> Result<StarbeamConfig, ConfigError> {
        let local_config = PathBuf::from("./starbeam.yaml");
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".starbeam").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        Ok(StarbeamConfig::default())
    }

    pub async fn load_from(path: &Path) -> Result<StarbeamConfig, ConfigError> {
        info!("Loading configuration from {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        let config: StarbeamConfig = serde_yaml::from_str(&content)?;
        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &StarbeamConfig) -> Result<(), ConfigError> {
        if config.engine.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "engine.poll_interval_ms must be greater than zero".into(),
            ));
        }
        if config.engine.wait_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "engine.wait_timeout_ms must be greater than zero".into(),
            ));
        }
        if config.target.host.trim().is_empty() {
            return Err(ConfigError::Invalid("target.host must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_load_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
engine:
  wait_timeout_ms: 8000
selectors:
  option:
    - kind: text
      selector: "li"
      variants:
        - text: "Site web"
          lang: fr
"#
        )
        .unwrap();

        let config = ConfigLoader::load_from(file.path()).await.unwrap();
        assert_eq!(config.engine.wait_timeout_ms, 8000);
        assert_eq!(config.engine.poll_interval_ms, 100);
        assert_eq!(config.engine.settle_delay_ms, 500);
        assert_eq!(config.selectors.option.matchers().len(), 1);
        assert_eq!(config.selectors.target_input.matchers().len(), 7);
        assert_eq!(config.target.host, "notebooklm.google.com");
    }

    #[tokio::test]
    async fn test_zero_poll_interval_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "engine:\n  poll_interval_ms: 0").unwrap();
        let err = ConfigLoader::load_from(file.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_empty_strategy_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "selectors:\n  menu_trigger: []").unwrap();
        let err = ConfigLoader::load_from(file.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(ConfigLoader::validate(&StarbeamConfig::default()).is_ok());
    }
}
