use std::sync::Arc;

use tracing::{debug, info};

use super::{SyncError, Topic};
use crate::codec::{self, CodecRegistry, Command, DeviceCodec, DeviceType, SyncConfig};
use crate::entity::{domain_of, EntityState};
use crate::host::{HomePlatform, HostError};

/// One synced entity (or area aggregate) and the codec that speaks for it.
#[derive(Debug, Clone)]
pub struct SyncDescriptor {
    topic: Topic,
    name: String,
    entity_id: String,
    config: SyncConfig,
    codec: Arc<dyn DeviceCodec>,
}

impl SyncDescriptor {
    pub fn new(
        codecs: &CodecRegistry,
        entity_id: &str,
        name: &str,
        config: SyncConfig,
    ) -> Result<Self, SyncError> {
        let valid = entity_id
            .split_once('.')
            .is_some_and(|(domain, object)| !domain.is_empty() && !object.is_empty());
        if !valid {
            return Err(SyncError::InvalidEntityId(entity_id.to_string()));
        }

        let codec: Arc<dyn DeviceCodec> = codecs.build(domain_of(entity_id), &config)?.into();
        let topic = Topic::for_entity(entity_id, codec.device_type());
        Ok(Self {
            topic,
            name: name.to_string(),
            entity_id: entity_id.to_string(),
            config,
            codec,
        })
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn device_type(&self) -> DeviceType {
        self.codec.device_type()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Rebuilds the codec from `config`. The device type, and so the topic,
    /// must stay the same.
    pub fn set_config(&mut self, codecs: &CodecRegistry, config: SyncConfig) -> Result<(), SyncError> {
        let codec = codecs.build(domain_of(&self.entity_id), &config)?;
        if codec.device_type() != self.device_type() {
            return Err(SyncError::DeviceTypeChanged {
                topic: self.topic.to_string(),
                from: self.device_type(),
                to: codec.device_type(),
            });
        }
        self.codec = codec.into();
        self.config = config;
        Ok(())
    }

    pub fn watched_entity_ids(&self) -> Vec<String> {
        let sources = self.codec.sources();
        if sources.is_empty() {
            return vec![self.entity_id.clone()];
        }
        sources.into_iter().map(|(_, id)| id.to_string()).collect()
    }

    pub fn watches(&self, entity_id: &str) -> bool {
        let sources = self.codec.sources();
        if sources.is_empty() {
            return self.entity_id == entity_id;
        }
        sources.iter().any(|(_, id)| *id == entity_id)
    }

    /// Live state the codec reads. Aggregates get a synthetic state holding
    /// each member's raw state under its slot key.
    pub async fn snapshot(&self, host: &dyn HomePlatform) -> Option<EntityState> {
        let sources = self.codec.sources();
        if sources.is_empty() {
            return host.state(&self.entity_id).await;
        }
        let mut snapshot = EntityState::new(self.entity_id.as_str(), "");
        for (key, member) in sources {
            if let Some(state) = host.state(member).await {
                snapshot.attributes.insert(key.to_string(), state.state.into());
            }
        }
        Some(snapshot)
    }

    /// Current message for this sync, `None` when there is nothing to say
    /// (entity gone or every slot absent).
    pub async fn generate_msg(&self, host: &dyn HomePlatform) -> Option<String> {
        let state = self.snapshot(host).await?;
        let tokens = codec::encode(self.codec.as_ref(), &state);
        if tokens.is_empty() {
            return None;
        }
        Some(tokens.to_message())
    }

    /// Decodes an inbound message and runs the resulting service call, if
    /// any, against the synced entity.
    pub async fn resolve_msg(
        &self,
        raw: &str,
        host: &dyn HomePlatform,
    ) -> Result<Option<Command>, HostError> {
        let Some(current) = self.snapshot(host).await else {
            debug!("No state for {}, ignoring '{}'", self.entity_id, raw);
            return Ok(None);
        };
        let decoded = codec::decode(self.codec.as_ref(), raw, &current);
        let Some(command) = decoded.command else {
            debug!("Nothing changed for {} in '{}'", self.entity_id, raw);
            return Ok(None);
        };

        let command = command.target(&self.entity_id);
        info!("{} -> {} {:?}", self.topic, command, command.data);
        host.call_service(&command).await?;
        Ok(Some(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;
    use serde_json::json;

    fn registry() -> CodecRegistry {
        CodecRegistry::with_defaults()
    }

    #[test]
    fn entity_ids_need_a_domain_and_object() {
        for bad in ["", "light", ".lamp", "light."] {
            assert!(matches!(
                SyncDescriptor::new(&registry(), bad, "x", SyncConfig::new()),
                Err(SyncError::InvalidEntityId(_))
            ));
        }
    }

    #[test]
    fn topic_follows_device_type() {
        let sync = SyncDescriptor::new(&registry(), "lock.door", "Door", SyncConfig::new()).unwrap();
        assert_eq!(sync.device_type(), DeviceType::Switch);
        assert!(sync.topic().as_str().ends_with("006"));
    }

    #[test]
    fn set_config_validates_and_keeps_topic() {
        let mut sync =
            SyncDescriptor::new(&registry(), "climate.bed", "Bed", SyncConfig::new()).unwrap();
        let topic = sync.topic().clone();
        let bad = SyncConfig::new().with("fan_modes", "broken");
        assert!(sync.set_config(&registry(), bad).is_err());
        assert!(sync.config().is_empty());

        let good = SyncConfig::new().with("fan_modes", "auto:0,low:1");
        sync.set_config(&registry(), good.clone()).unwrap();
        assert_eq!(sync.config(), &good);
        assert_eq!(sync.topic(), &topic);
    }

    #[test]
    fn area_watches_its_members() {
        let config = SyncConfig::new()
            .with("temperature", "sensor.t")
            .with("humidity", "sensor.h");
        let sync = SyncDescriptor::new(&registry(), "area.study", "Study", config).unwrap();
        assert_eq!(sync.watched_entity_ids(), vec!["sensor.t", "sensor.h"]);
        assert!(sync.watches("sensor.h"));
        assert!(!sync.watches("area.study"));
    }

    #[tokio::test]
    async fn generate_msg_reads_live_state() {
        let host = FakeHost::new();
        host.set_state(
            EntityState::new("light.lamp", "on")
                .with_attr("brightness", 255)
                .with_attr("rgb_color", json!([0, 0, 255])),
        );
        let sync = SyncDescriptor::new(&registry(), "light.lamp", "Lamp", SyncConfig::new()).unwrap();
        assert_eq!(sync.generate_msg(&host).await.as_deref(), Some("on#100#255"));

        let gone = SyncDescriptor::new(&registry(), "light.gone", "Gone", SyncConfig::new()).unwrap();
        assert_eq!(gone.generate_msg(&host).await, None);
    }

    #[tokio::test]
    async fn area_message_is_built_from_members() {
        let host = FakeHost::new();
        host.set_state(EntityState::new("sensor.t", "19"));
        host.set_state(EntityState::new("sensor.h", "unknown"));
        let config = SyncConfig::new()
            .with("temperature", "sensor.t")
            .with("humidity", "sensor.h");
        let sync = SyncDescriptor::new(&registry(), "area.study", "Study", config).unwrap();
        assert_eq!(sync.generate_msg(&host).await.as_deref(), Some("#19"));
    }

    #[tokio::test]
    async fn resolve_msg_calls_the_host_once() {
        let host = FakeHost::new();
        host.set_state(EntityState::new("cover.blind", "closed").with_attr("current_position", 0));
        let sync = SyncDescriptor::new(&registry(), "cover.blind", "Blind", SyncConfig::new()).unwrap();

        let command = sync.resolve_msg("on#100", &host).await.unwrap().unwrap();
        assert_eq!(command.entity_id(), Some("cover.blind"));
        assert_eq!(host.calls(), vec![command]);

        assert_eq!(sync.resolve_msg("off#0", &host).await.unwrap(), None);
        assert_eq!(host.calls().len(), 1);
    }
}
