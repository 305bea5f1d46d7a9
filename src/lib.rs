//! # bemfa-bridge
//!
//! Keeps home-automation entities in sync with the bemfa cloud MQTT broker.
//!
//! Each synced entity gets a bemfa topic. Its state is encoded into a short
//! `#`-separated message and published whenever it changes; commands coming
//! back from the bemfa app or a voice assistant are decoded, diffed against
//! the current state and turned into at most one service call on the host.
//!
//! ```text
//! HomePlatform ──state──► codec::encode ──► mqtt (hass<md5><suffix>/set)
//!      ▲                                          │
//!      └──service call◄── codec::decode ◄─────────┘ (hass<md5><suffix>)
//! ```
//!
//! The host side is abstracted behind [`host::HomePlatform`]; the bemfa
//! directory behind [`directory::TopicDirectory`]. [`service::BemfaService`]
//! is the entry point.

pub mod codec;
pub mod config;
pub mod directory;
pub mod entity;
pub mod error;
pub mod host;
pub mod logging;
pub mod mqtt;
pub mod persistence;
pub mod service;
pub mod sync;

#[cfg(test)]
mod testing;

pub use codec::{Command, DeviceType, Token, TokenSequence};
pub use config::{validate_uid, BridgeConfig};
pub use entity::EntityState;
pub use error::BridgeError;
pub use host::{Area, HomePlatform, StateChanged};
pub use service::{BemfaService, RemoteTopic, SensorCandidates};
pub use sync::{SyncConfig, SyncDescriptor, Topic};
