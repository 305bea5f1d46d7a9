use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::entity::Attributes;

pub const ATTR_ENTITY_ID: &str = "entity_id";

/// A host service call produced by a resolver. Codecs only build these; the
/// sync descriptor hands them to the host.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Command {
    pub domain: String,
    pub service: String,
    pub data: Attributes,
}

impl Command {
    pub fn new(domain: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            data: Attributes::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn target(self, entity_id: &str) -> Self {
        self.with(ATTR_ENTITY_ID, entity_id)
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.data.get(ATTR_ENTITY_ID)?.as_str()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.service)
    }
}
