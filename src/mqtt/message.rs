use chrono::{DateTime, Local};
use std::fmt;

const PREVIEW_CHARS: usize = 32;

/// A publish received from the broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: String,
    pub timestamp: DateTime<Local>,
}

impl InboundMessage {
    pub fn from_topic(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        InboundMessage {
            topic: topic.into(),
            payload: payload.into(),
            timestamp: Local::now(),
        }
    }

    /// Non-UTF-8 bytes are replaced rather than dropped.
    pub fn from_bytes(topic: impl Into<String>, payload: &[u8]) -> Self {
        Self::from_topic(topic, String::from_utf8_lossy(payload).into_owned())
    }
}

impl fmt::Display for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let preview: String = self.payload.chars().take(PREVIEW_CHARS).collect();
        let ellipsis = if self.payload.chars().count() > PREVIEW_CHARS {
            "..."
        } else {
            ""
        };
        write!(
            f,
            "{} {}: {}{}",
            self.timestamp.format("%H:%M:%S"),
            self.topic,
            preview,
            ellipsis
        )
    }
}
