//! Boundary to the home-automation platform.
//!
//! The bridge never owns entity state. It reads it, listens for changes and
//! asks the platform to run services, all through [`HomePlatform`].

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::codec::Command;
use crate::entity::EntityState;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Service call failed: {0}")]
    ServiceCallError(String),

    #[error("Host unavailable: {0}")]
    UnavailableError(String),
}

/// A state change on the host bus. `new_state` is `None` when the entity was
/// removed.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChanged {
    pub entity_id: String,
    pub new_state: Option<EntityState>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Area {
    pub id: String,
    pub name: String,
}

#[async_trait]
pub trait HomePlatform: Send + Sync {
    /// Current state, `None` for unknown or stale entity ids.
    async fn state(&self, entity_id: &str) -> Option<EntityState>;

    /// All entities whose domain is in `domains`.
    async fn entities(&self, domains: &[&str]) -> Vec<EntityState>;

    async fn areas(&self) -> Vec<Area>;

    /// Entity ids assigned to an area.
    async fn area_entities(&self, area_id: &str) -> Vec<String>;

    fn subscribe_state_changes(&self) -> broadcast::Receiver<StateChanged>;

    /// Resolves once the platform has finished loading its integrations.
    async fn wait_until_started(&self);

    async fn call_service(&self, command: &Command) -> Result<(), HostError>;
}
