use std::borrow::Borrow;
use std::fmt;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

use crate::codec::DeviceType;

pub const TOPIC_PREFIX: &str = "hass";
pub const TOPIC_PING: &str = "hassping";
pub const PING_PAYLOAD: &str = "ping";

/// A bemfa topic id. Derived once from the entity id and device type and
/// never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// `hass` + md5(entity_id) + device suffix.
    pub fn for_entity(entity_id: &str, device_type: DeviceType) -> Self {
        let digest = Md5::digest(entity_id.as_bytes());
        Topic(format!(
            "{}{:x}{}",
            TOPIC_PREFIX,
            digest,
            device_type.topic_suffix()
        ))
    }

    pub fn ping() -> Self {
        Topic(TOPIC_PING.to_string())
    }

    pub fn is_ping(&self) -> bool {
        self.0 == TOPIC_PING
    }

    /// Outbound state goes to `<topic>/set` so the broker does not echo it
    /// back to our own subscription.
    pub fn publish_topic(&self) -> String {
        format!("{}/set", self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Topic {
    fn from(value: String) -> Self {
        Topic(value)
    }
}

impl From<&str> for Topic {
    fn from(value: &str) -> Self {
        Topic(value.to_string())
    }
}

impl Borrow<str> for Topic {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
