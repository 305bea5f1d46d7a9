//! # Persistence Module
//!
//! Per-topic sync options (climate lookup tables, area sensor members) are
//! the only state the bridge keeps between runs. Everything else is either
//! derived from the host or fetched from the bemfa directory at start.
//!
//! ## Error Handling Strategy
//! Uses `color_eyre` for file operations. A missing file is an empty store,
//! not an error, so a fresh install starts cleanly.

mod file_store;

pub use file_store::FileConfigStore;

use std::collections::BTreeMap;

use async_trait::async_trait;
use color_eyre::Result;

use crate::sync::{SyncConfig, Topic};

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load_all(&self) -> Result<BTreeMap<Topic, SyncConfig>>;

    /// Storing an empty config removes the entry.
    async fn save(&self, topic: &Topic, config: &SyncConfig) -> Result<()>;

    /// Removing a missing topic is not an error.
    async fn remove(&self, topic: &Topic) -> Result<()>;
}
