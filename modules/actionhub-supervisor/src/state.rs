//! Runtime state that outlives the process: the clip-check watermark.

use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where the last successful clip check is remembered between runs.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// `None` on first boot.
    async fn last_clip_check(&self) -> Result<Option<DateTime<Utc>>>;

    async fn update_last_clip_check(&self, at: DateTime<Utc>) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    last_clip_check: Option<DateTime<Utc>>,
}

/// TOML file next to the settings. A missing file reads as first boot.
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read(&self) -> Result<StateFile> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => toml::from_str(&text)
                .with_context(|| format!("parsing state file {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StateFile::default()),
            Err(e) => {
                Err(e).with_context(|| format!("reading state file {}", self.path.display()))
            }
        }
    }
}

#[async_trait]
impl WatermarkStore for FileWatermarkStore {
    async fn last_clip_check(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.read().await?.last_clip_check)
    }

    async fn update_last_clip_check(&self, at: DateTime<Utc>) -> Result<()> {
        let mut state = self.read().await?;
        state.last_clip_check = Some(at);
        let body = toml::to_string_pretty(&state).context("serializing state file")?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        tokio::fs::write(&self.path, body)
            .await
            .with_context(|| format!("writing state file {}", self.path.display()))?;
        debug!(path = %self.path.display(), at = %at, "Clip watermark saved");
        Ok(())
    }
}

/// Process-local store for runs without a state file.
#[derive(Default)]
pub struct MemoryWatermarkStore {
    last: Mutex<Option<DateTime<Utc>>>,
}

#[async_trait]
impl WatermarkStore for MemoryWatermarkStore {
    async fn last_clip_check(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(*self.last.lock().unwrap_or_else(std::sync::PoisonError::into_inner))
    }

    async fn update_last_clip_check(&self, at: DateTime<Utc>) -> Result<()> {
        *self.last.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = Some(at);
        Ok(())
    }
}
