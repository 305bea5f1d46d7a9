use std::collections::BTreeMap;

use tracing::debug;

use super::climate::ClimateCodec;
use super::sensor::{AREA_DOMAIN, SensorCodec};
use super::switch::{SwitchCodec, PLAIN_SWITCH_DOMAINS};
use super::{BinarySensorCodec, CodecError, CoverCodec, DeviceCodec, FanCodec, LightCodec};
use super::SyncConfig;

/// Builds a codec for an entity domain from its sync options.
pub type CodecFactory = fn(&str, &SyncConfig) -> Result<Box<dyn DeviceCodec>, CodecError>;

/// Domain string to codec factory, filled once at startup.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    factories: BTreeMap<String, CodecFactory>,
}

fn light(_: &str, config: &SyncConfig) -> Result<Box<dyn DeviceCodec>, CodecError> {
    config.ensure_keys(&[])?;
    Ok(Box::new(LightCodec))
}

fn cover(_: &str, config: &SyncConfig) -> Result<Box<dyn DeviceCodec>, CodecError> {
    config.ensure_keys(&[])?;
    Ok(Box::new(CoverCodec))
}

fn fan(_: &str, config: &SyncConfig) -> Result<Box<dyn DeviceCodec>, CodecError> {
    config.ensure_keys(&[])?;
    Ok(Box::new(FanCodec))
}

fn climate(_: &str, config: &SyncConfig) -> Result<Box<dyn DeviceCodec>, CodecError> {
    Ok(Box::new(ClimateCodec::from_config(config)?))
}

fn switch(domain: &str, config: &SyncConfig) -> Result<Box<dyn DeviceCodec>, CodecError> {
    config.ensure_keys(&[])?;
    let codec =
        SwitchCodec::new(domain).ok_or_else(|| CodecError::UnsupportedDomain(domain.to_string()))?;
    Ok(Box::new(codec))
}

fn area(_: &str, config: &SyncConfig) -> Result<Box<dyn DeviceCodec>, CodecError> {
    Ok(Box::new(SensorCodec::from_config(config)?))
}

fn binary_sensor(_: &str, config: &SyncConfig) -> Result<Box<dyn DeviceCodec>, CodecError> {
    config.ensure_keys(&[])?;
    Ok(Box::new(BinarySensorCodec))
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every device family bemfa supports.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("light", light);
        registry.register("cover", cover);
        registry.register("fan", fan);
        registry.register("climate", climate);
        registry.register(AREA_DOMAIN, area);
        registry.register("binary_sensor", binary_sensor);
        for domain in PLAIN_SWITCH_DOMAINS {
            registry.register(domain, switch);
        }
        for domain in ["camera", "media_player", "lock", "scene", "group", "vacuum"] {
            registry.register(domain, switch);
        }
        registry
    }

    pub fn register(&mut self, domain: &str, factory: CodecFactory) {
        debug!("Registering codec for domain: {}", domain);
        self.factories.insert(domain.to_string(), factory);
    }

    pub fn supports(&self, domain: &str) -> bool {
        self.factories.contains_key(domain)
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn build(
        &self,
        domain: &str,
        config: &SyncConfig,
    ) -> Result<Box<dyn DeviceCodec>, CodecError> {
        let factory = self
            .factories
            .get(domain)
            .ok_or_else(|| CodecError::UnsupportedDomain(domain.to_string()))?;
        factory(domain, config)
    }
}
