use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::ConfigStore;
use crate::config::config_dir;
use crate::sync::{SyncConfig, Topic};

const SYNC_CONFIG_FILE: &str = "sync_config.toml";

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
struct StoredSyncConfigs {
    #[serde(default)]
    topics: BTreeMap<Topic, SyncConfig>,
}

/// TOML-backed store. Writes are serialized so concurrent saves cannot lose
/// each other's entries.
#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// `~/.config/bemfa-bridge/sync_config.toml`
    pub fn default_location() -> Self {
        Self::new(config_dir().join(SYNC_CONFIG_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<StoredSyncConfigs> {
        if !tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| eyre!("Failed to check if sync config file exists: {}", e))?
        {
            debug!("No sync config at {}, starting empty", self.path.display());
            return Ok(StoredSyncConfigs::default());
        }

        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| eyre!("Failed to read sync config file: {}", e))?;
        toml::from_str(&content).map_err(|e| eyre!("Failed to parse sync config file: {}", e))
    }

    async fn write(&self, stored: &StoredSyncConfigs) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }
        let content = toml::to_string_pretty(stored)
            .map_err(|e| eyre!("Failed to serialize sync config: {}", e))?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| eyre!("Failed to write sync config file: {}", e))
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load_all(&self) -> Result<BTreeMap<Topic, SyncConfig>> {
        let stored = self.read().await?;
        info!("Loaded sync config for {} topics", stored.topics.len());
        Ok(stored.topics)
    }

    async fn save(&self, topic: &Topic, config: &SyncConfig) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut stored = self.read().await?;
        if config.is_empty() {
            stored.topics.remove(topic);
        } else {
            stored.topics.insert(topic.clone(), config.clone());
        }
        self.write(&stored).await?;
        debug!("Saved sync config for {}", topic);
        Ok(())
    }

    async fn remove(&self, topic: &Topic) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut stored = self.read().await?;
        if stored.topics.remove(topic).is_none() {
            return Ok(());
        }
        self.write(&stored).await?;
        debug!("Removed sync config for {}", topic);
        Ok(())
    }
}
