//! # Bridge facade
//!
//! [`BemfaService`] wires the host, the bemfa directory, the config store
//! and the sync worker together. It exposes the start/stop lifecycle plus the
//! entry points a setup flow needs: candidate discovery, orphan listing and
//! create/modify/destroy of syncs.
//!
//! The directory is the source of truth for which syncs exist. On start the
//! registry is rebuilt from the host's entities whose topic is already known
//! remotely; names come from the directory, options from the config store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::codec::{CodecRegistry, SensorSlot, AREA_DOMAIN};
use crate::config::BridgeConfig;
use crate::directory::{BemfaHttp, TopicDirectory};
use crate::entity::{AttributeExt, EntityState, ATTR_DEVICE_CLASS};
use crate::error::BridgeError;
use crate::host::HomePlatform;
use crate::mqtt::{ConnectionManager, MqttStatus, MqttTransport, RumqttcTransport};
use crate::persistence::{ConfigStore, FileConfigStore};
use crate::sync::{SyncConfig, SyncDescriptor, Topic, PING_PAYLOAD};

const SENSOR_DOMAIN: &str = "sensor";

/// A topic listed in the bemfa directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTopic {
    pub topic: Topic,
    pub name: String,
    /// The local entity behind the topic, `None` for orphans.
    pub entity_id: Option<String>,
}

impl RemoteTopic {
    pub fn is_orphan(&self) -> bool {
        self.entity_id.is_none()
    }
}

/// Sensors of an area eligible for one measurement slot.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorCandidates {
    pub slot: SensorSlot,
    pub sensors: Vec<EntityState>,
}

pub struct BemfaService {
    config: BridgeConfig,
    codecs: CodecRegistry,
    host: Arc<dyn HomePlatform>,
    directory: Arc<dyn TopicDirectory>,
    store: Arc<dyn ConfigStore>,
    connection: ConnectionManager,
    populate: Mutex<Option<JoinHandle<()>>>,
}

impl BemfaService {
    /// Must be called inside a tokio runtime; the sync worker is spawned
    /// right away but stays disconnected until [`start`](Self::start).
    pub fn new(
        config: BridgeConfig,
        host: Arc<dyn HomePlatform>,
        directory: Arc<dyn TopicDirectory>,
        store: Arc<dyn ConfigStore>,
        transport: Box<dyn MqttTransport>,
    ) -> Result<Self, BridgeError> {
        config.validate()?;
        let (connection, _worker) =
            ConnectionManager::spawn(config.mqtt.clone(), transport, host.clone());
        Ok(Self {
            config,
            codecs: CodecRegistry::with_defaults(),
            host,
            directory,
            store,
            connection,
            populate: Mutex::new(None),
        })
    }

    /// bemfa HTTP directory, rumqttc transport and the TOML config store in
    /// the user's config directory.
    pub fn connect_bemfa(config: BridgeConfig, host: Arc<dyn HomePlatform>) -> Result<Self, BridgeError> {
        config.validate()?;
        let directory = Arc::new(BemfaHttp::new(&config.uid, &config.http)?);
        let transport = Box::new(RumqttcTransport::new(&config.uid, config.mqtt.clone()));
        let store = Arc::new(FileConfigStore::default_location());
        Self::new(config, host, directory, store, transport)
    }

    /// Replaces the codec table. Only affects syncs built afterwards.
    pub fn with_codecs(mut self, codecs: CodecRegistry) -> Self {
        self.codecs = codecs;
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn status(&self) -> MqttStatus {
        self.connection.status()
    }

    /// Makes sure the heartbeat topic exists, connects, and once the host
    /// has started registers every entity whose topic bemfa already knows.
    ///
    /// A failed first connection is not an error here; the worker keeps
    /// retrying in the background.
    pub async fn start(&self) -> Result<(), BridgeError> {
        let mut topics = self.directory.fetch_all_topics().await?;
        let ping = Topic::ping();
        if topics.remove(&ping).is_none() {
            info!("Creating heartbeat topic {}", ping);
            self.directory.create_topic(&ping, PING_PAYLOAD).await?;
        }

        if let Err(e) = self.connection.connect().await {
            warn!("Initial connection failed, retrying in background: {}", e);
        }

        let stored = match self.store.load_all().await {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Could not load sync config, starting without it: {}", e);
                BTreeMap::new()
            }
        };

        let codecs = self.codecs.clone();
        let host = self.host.clone();
        let connection = self.connection.clone();
        let handle = tokio::spawn(async move {
            host.wait_until_started().await;
            populate(&codecs, host.as_ref(), &connection, &topics, &stored).await;
        });

        let previous = match self.populate.lock() {
            Ok(mut slot) => slot.replace(handle),
            Err(poisoned) => poisoned.into_inner().replace(handle),
        };
        if let Some(previous) = previous {
            previous.abort();
        }
        Ok(())
    }

    /// Safe to call at any time, including before or without `start`.
    pub async fn stop(&self) {
        let pending = match self.populate.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(pending) = pending {
            pending.abort();
        }
        if let Err(e) = self.connection.disconnect().await {
            warn!("Disconnect failed: {}", e);
        }
        info!("Bridge stopped");
    }

    /// One descriptor per syncable host entity plus one per area.
    pub async fn collect_supported_syncs(&self) -> Vec<SyncDescriptor> {
        collect_supported_syncs(&self.codecs, self.host.as_ref()).await
    }

    /// Sensors of `area_id` grouped by the measurement they can provide.
    /// Slots without any candidate are left out.
    pub async fn area_sensor_candidates(&self, area_id: &str) -> Vec<SensorCandidates> {
        let members = self.host.area_entities(area_id).await;
        let sensors: Vec<EntityState> = self
            .host
            .entities(&[SENSOR_DOMAIN])
            .await
            .into_iter()
            .filter(|state| members.contains(&state.entity_id))
            .collect();

        SensorSlot::ALL
            .into_iter()
            .filter_map(|slot| {
                let matching: Vec<EntityState> = sensors
                    .iter()
                    .filter(|state| state.attributes.text(ATTR_DEVICE_CLASS) == Some(slot.device_class()))
                    .cloned()
                    .collect();
                (!matching.is_empty()).then_some(SensorCandidates {
                    slot,
                    sensors: matching,
                })
            })
            .collect()
    }

    /// Directory topics, without the heartbeat topic.
    async fn remote_topics(&self) -> Result<BTreeMap<Topic, String>, BridgeError> {
        let mut topics = self.directory.fetch_all_topics().await?;
        topics.remove(&Topic::ping());
        Ok(topics)
    }

    /// Every remote topic, joined with the local entity where there is one.
    pub async fn synced_topics(&self) -> Result<Vec<RemoteTopic>, BridgeError> {
        let topics = self.remote_topics().await?;
        let local: BTreeMap<Topic, String> = self
            .collect_supported_syncs()
            .await
            .into_iter()
            .map(|sync| (sync.topic().clone(), sync.entity_id().to_string()))
            .collect();

        Ok(topics
            .into_iter()
            .map(|(topic, name)| {
                let entity_id = local.get(&topic).cloned();
                RemoteTopic {
                    topic,
                    name,
                    entity_id,
                }
            })
            .collect())
    }

    /// Remote topics with no local entity. Never removed automatically.
    pub async fn orphans(&self) -> Result<Vec<RemoteTopic>, BridgeError> {
        Ok(self
            .synced_topics()
            .await?
            .into_iter()
            .filter(RemoteTopic::is_orphan)
            .collect())
    }

    /// Candidates bemfa does not know about yet.
    pub async fn unsynced_entities(&self) -> Result<Vec<SyncDescriptor>, BridgeError> {
        let topics = self.remote_topics().await?;
        Ok(self
            .collect_supported_syncs()
            .await
            .into_iter()
            .filter(|sync| !topics.contains_key(sync.topic()))
            .collect())
    }

    async fn ensure_entity_exists(&self, entity_id: &str) -> Result<(), BridgeError> {
        let exists = match entity_id.split_once('.') {
            Some((AREA_DOMAIN, area_id)) => {
                self.host.areas().await.iter().any(|area| area.id == area_id)
            }
            _ => self.host.state(entity_id).await.is_some(),
        };
        if exists {
            Ok(())
        } else {
            Err(BridgeError::UnknownEntity(entity_id.to_string()))
        }
    }

    /// Registers the topic with bemfa, stores the options and starts
    /// syncing. Returns the new topic.
    pub async fn create_sync(
        &self,
        entity_id: &str,
        name: &str,
        config: SyncConfig,
    ) -> Result<Topic, BridgeError> {
        let sync = SyncDescriptor::new(&self.codecs, entity_id, name, config)?;
        self.ensure_entity_exists(entity_id).await?;

        let topic = sync.topic().clone();
        self.directory.create_topic(&topic, name).await?;
        self.store.save(&topic, sync.config()).await?;
        self.connection.create_sync(sync).await?;
        info!("Syncing {} as {} ({})", entity_id, topic, name);
        Ok(topic)
    }

    /// Renames remotely only when the name changed and reconfigures only
    /// when the options changed.
    pub async fn modify_sync(
        &self,
        topic: &Topic,
        name: &str,
        config: SyncConfig,
    ) -> Result<(), BridgeError> {
        let mut sync = self
            .connection
            .syncs()
            .await?
            .into_iter()
            .find(|sync| sync.topic() == topic)
            .ok_or_else(|| BridgeError::UnknownTopic(topic.to_string()))?;

        let reconfigure = sync.config() != &config;
        if reconfigure {
            sync.set_config(&self.codecs, config)?;
        }
        let rename = sync.name() != name;
        if rename {
            self.directory.rename_topic(topic, name).await?;
            sync.set_name(name);
        }
        if reconfigure {
            self.store.save(topic, sync.config()).await?;
        }
        if !rename && !reconfigure {
            debug!("Nothing to change for {}", topic);
            return Ok(());
        }

        self.connection.modify_sync(sync).await?;
        Ok(())
    }

    /// Deletes the topic remotely and stops syncing it. Works for orphans.
    pub async fn destroy_sync(&self, topic: &Topic) -> Result<(), BridgeError> {
        self.directory.delete_topic(topic).await?;
        if !self.connection.destroy_sync(topic.clone()).await? {
            debug!("{} was not synced locally", topic);
        }
        if let Err(e) = self.store.remove(topic).await {
            warn!("Could not remove stored config for {}: {}", topic, e);
        }
        info!("Stopped syncing {}", topic);
        Ok(())
    }
}

async fn collect_supported_syncs(codecs: &CodecRegistry, host: &dyn HomePlatform) -> Vec<SyncDescriptor> {
    let domains: Vec<&str> = codecs.domains().filter(|domain| *domain != AREA_DOMAIN).collect();
    let mut syncs: Vec<SyncDescriptor> = Vec::new();

    for state in host.entities(&domains).await {
        match SyncDescriptor::new(codecs, &state.entity_id, state.name(), SyncConfig::new()) {
            Ok(sync) => syncs.push(sync),
            Err(e) => debug!("Skipping {}: {}", state.entity_id, e),
        }
    }

    if codecs.supports(AREA_DOMAIN) {
        for area in host.areas().await {
            let entity_id = format!("{}.{}", AREA_DOMAIN, area.id);
            match SyncDescriptor::new(codecs, &entity_id, &area.name, SyncConfig::new()) {
                Ok(sync) => syncs.push(sync),
                Err(e) => debug!("Skipping area {}: {}", area.id, e),
            }
        }
    }

    syncs.sort_by(|a, b| a.entity_id().cmp(b.entity_id()));
    syncs
}

async fn populate(
    codecs: &CodecRegistry,
    host: &dyn HomePlatform,
    connection: &ConnectionManager,
    topics: &BTreeMap<Topic, String>,
    stored: &BTreeMap<Topic, SyncConfig>,
) {
    let mut count = 0;
    for mut sync in collect_supported_syncs(codecs, host).await {
        let Some(name) = topics.get(sync.topic()) else {
            continue;
        };
        sync.set_name(name);
        if let Some(config) = stored.get(sync.topic()) {
            if let Err(e) = sync.set_config(codecs, config.clone()) {
                warn!("Ignoring stored config for {}: {}", sync.topic(), e);
            }
        }
        match connection.create_sync(sync).await {
            Ok(()) => count += 1,
            Err(e) => warn!("Could not register sync: {}", e),
        }
    }
    info!("Registered {} syncs", count);
}
