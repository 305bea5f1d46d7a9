use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::BridgeError;
use crate::mqtt::MqttConfig;

const CONFIG_DIR: &str = ".config/bemfa-bridge";
const CONFIG_FILE: &str = "config.toml";

pub const HTTP_BASE_URL: &str = "https://api.bemfa.com/api";
const HTTP_TIMEOUT_SECS: u64 = 10;
const UID_LEN: usize = 32;

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}

/// `~/.config/bemfa-bridge`
pub fn config_dir() -> PathBuf {
    get_home_dir().join(CONFIG_DIR)
}

/// The bemfa private key: 32 lowercase hex characters.
pub fn validate_uid(uid: &str) -> Result<(), BridgeError> {
    let valid = uid.len() == UID_LEN
        && uid
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
    if valid {
        Ok(())
    } else {
        Err(BridgeError::InvalidUid(uid.to_string()))
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: HTTP_BASE_URL.to_string(),
            timeout_secs: HTTP_TIMEOUT_SECS,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    pub uid: String,
    pub mqtt: MqttConfig,
    pub http: HttpConfig,
}

impl BridgeConfig {
    pub fn new(uid: &str) -> Self {
        Self {
            uid: uid.to_string(),
            ..Self::default()
        }
    }

    pub fn default_path() -> PathBuf {
        config_dir().join(CONFIG_FILE)
    }

    /// Loads `~/.config/bemfa-bridge/config.toml`.
    pub async fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()).await
    }

    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        let config: Self =
            toml::from_str(&content).map_err(|e| eyre!("Failed to parse config file: {}", e))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub async fn ensure_default_config() -> Result<PathBuf> {
        let path = Self::default_path();
        Self::ensure_default_config_at(&path).await?;
        Ok(path)
    }

    /// Writes the defaults unless a file already exists. Returns whether one
    /// was written.
    pub async fn ensure_default_config_at(path: &Path) -> Result<bool> {
        if tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            return Ok(false);
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| eyre!("Failed to serialize default config: {}", e))?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| eyre!("Failed to write default config: {}", e))?;
        info!("Wrote default config to {}", path.display());
        Ok(true)
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        validate_uid(&self.uid)
    }
}
