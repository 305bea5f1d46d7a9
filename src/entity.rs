//! Entity state as the host platform reports it.
//!
//! Everything the codecs read comes through [`EntityState`]: the raw state
//! string plus a loosely typed attribute map. Attribute values are JSON values
//! because the host stores heterogeneous data (numbers, strings, lists, null)
//! under the same map.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const STATE_ON: &str = "on";
pub const STATE_OFF: &str = "off";
pub const STATE_UNAVAILABLE: &str = "unavailable";
pub const STATE_UNKNOWN: &str = "unknown";

pub const ATTR_FRIENDLY_NAME: &str = "friendly_name";
pub const ATTR_DEVICE_CLASS: &str = "device_class";
pub const ATTR_SUPPORTED_FEATURES: &str = "supported_features";

/// Attribute map of an entity.
pub type Attributes = serde_json::Map<String, Value>;

/// Current state of one entity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl EntityState {
    pub fn new(entity_id: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            state: state.into(),
            attributes: Attributes::new(),
        }
    }

    /// Builder helper, mostly used by tests and host adapters.
    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Domain part of the entity id (`light` for `light.kitchen`).
    pub fn domain(&self) -> &str {
        domain_of(&self.entity_id)
    }

    /// Friendly name if the host provides one, the entity id otherwise.
    pub fn name(&self) -> &str {
        self.attributes
            .text(ATTR_FRIENDLY_NAME)
            .unwrap_or(&self.entity_id)
    }
}

pub fn domain_of(entity_id: &str) -> &str {
    entity_id.split('.').next().unwrap_or_default()
}

/// Typed accessors over [`Attributes`]. A key holding `null` reads as missing.
pub trait AttributeExt {
    fn number(&self, key: &str) -> Option<f64>;
    fn integer(&self, key: &str) -> Option<i64>;
    fn text(&self, key: &str) -> Option<&str>;
    fn flag(&self, key: &str) -> Option<bool>;
    fn list_contains(&self, key: &str, item: &str) -> bool;
}

impl AttributeExt for Attributes {
    fn number(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn integer(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_str()
    }

    fn flag(&self, key: &str) -> Option<bool> {
        self.get(key)?.as_bool()
    }

    fn list_contains(&self, key: &str, item: &str) -> bool {
        self.get(key)
            .and_then(Value::as_array)
            .is_some_and(|items| items.iter().any(|v| v.as_str() == Some(item)))
    }
}
