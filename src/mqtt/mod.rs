//! # MQTT session with bemfa
//!
//! One tokio task, the sync worker, owns the registry, the broker session
//! and the heartbeat. Everything else talks to it through
//! [`ConnectionManager`], a cloneable handle sending actions with oneshot
//! replies.
//!
//! ```text
//! mqtt/
//! ├── config.rs      - broker and heartbeat settings
//! ├── message.rs     - inbound publish representation
//! ├── transport.rs   - MqttTransport trait and the rumqttc implementation
//! ├── heartbeat.rs   - ping/echo deadline bookkeeping
//! ├── session.rs     - Disconnected -> Connecting -> Connected (statum)
//! └── connection.rs  - sync worker loop and ConnectionManager handle
//! ```
//!
//! ## Flow
//!
//! ```text
//! host state change ──► worker ──► descriptors watching the entity ──► publish <topic>/set
//! broker publish    ──► worker ──► hassping: heartbeat echo
//!                                  <topic>:  descriptor.resolve_msg ──► host service call
//! ```
//!
//! The rumqttc event loop runs on its own task and only forwards publishes
//! into the worker. When it dies the inbound channel closes and the worker
//! reconnects, re-subscribing and re-publishing every registered sync.

pub mod config;
pub mod connection;
pub mod heartbeat;
pub mod message;
pub mod session;
pub mod transport;

pub use config::MqttConfig;
pub use connection::{ConnectionAction, ConnectionManager, ConnectionState, MqttStatus};
pub use heartbeat::{Heartbeat, HeartbeatEvent, HeartbeatPhase};
pub use message::InboundMessage;
pub use session::{MqttSession, SessionEvent};
pub use transport::{MqttTransport, RumqttcTransport};

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Client error: {0}")]
    ClientError(#[from] rumqttc::ClientError),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Not connected")]
    NotConnected,

    #[error("Channel error: {0}")]
    ChannelError(String),
}
