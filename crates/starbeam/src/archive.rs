//! Local archive of the last beamed or saved URL set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Failed to access archive: {0}")]
    Io(#[from] std::io::Error),
    #[error("Archive is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl ArchiveError {
    pub fn code(&self) -> &'static str {
        match self {
            ArchiveError::Io(_) => "ARCHIVE_IO",
            ArchiveError::Corrupt(_) => "ARCHIVE_CORRUPT",
        }
    }

    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ArchiveError::Io(_) => "Check permissions on the archive directory",
            ArchiveError::Corrupt(_) => "Delete the archive file or save a new selection",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archive {
    #[serde(default)]
    pub archived_stars: Vec<String>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl Archive {
    pub fn is_empty(&self) -> bool {
        self.archived_stars.is_empty()
    }
}

pub struct ArchiveStore {
    path: PathBuf,
}

impl ArchiveStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the archive. A missing file is an empty archive.
    pub async fn load(&self) -> Result<Archive, ArchiveError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No archive at {}", self.path.display());
                Ok(Archive::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the archive with `urls`.
    pub async fn save(&self, urls: &[String]) -> Result<Archive, ArchiveError> {
        let archive = Archive {
            archived_stars: urls.to_vec(),
            saved_at: Some(Utc::now()),
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_string_pretty(&archive)?;
        tokio::fs::write(&self.path, json).await?;
        info!(
            "Archived {} URLs to {}",
            archive.archived_stars.len(),
            self.path.display()
        );
        Ok(archive)
    }
}
