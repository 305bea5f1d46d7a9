//! # Device codecs
//!
//! Pure translation between host entity state and bemfa's positional
//! `#`-separated messages. No I/O happens here.
//!
//! Every device type is a [`DeviceCodec`]: an ordered list of slot
//! generators for the outbound direction and a list of resolvers for the
//! inbound direction.
//!
//! ```text
//! EntityState ──► [generators] ──► TokenSequence ──► "on#50#16711680"
//!
//! "on#75#16711680" ──► TokenSequence ──┐
//!                                      ├──► [resolvers] ──► Option<Command>
//! EntityState ──► encode (baseline) ───┘
//! ```
//!
//! A resolver owns a slot range. The first resolver whose range differs from
//! the baseline builds the command and the rest are skipped, so one inbound
//! message triggers at most one service call.
//!
//! Codecs are looked up by entity domain through [`CodecRegistry`].

mod climate;
mod command;
mod cover;
mod fan;
mod light;
mod options;
mod registry;
mod sensor;
mod switch;
mod token;

pub use climate::{ClimateCodec, HVAC_MODES, OPTION_FAN_MODES, OPTION_SWING_MODES};
pub use command::{Command, ATTR_ENTITY_ID};
pub use cover::CoverCodec;
pub use fan::{FanCodec, MAX_FAN_SPEED};
pub use light::LightCodec;
pub use options::{LookupTable, SyncConfig};
pub use registry::{CodecFactory, CodecRegistry};
pub use sensor::{BinarySensorCodec, SensorCodec, SensorSlot, AREA_DOMAIN};
pub use switch::{SwitchCodec, SwitchVariant, PLAIN_SWITCH_DOMAINS};
pub use token::{Token, TokenSequence, MSG_OFF, MSG_ON, MSG_PAUSE, SEPARATOR};

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::{Attributes, EntityState};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("No codec registered for domain '{0}'")]
    UnsupportedDomain(String),

    #[error("Unknown option '{0}'")]
    UnknownOption(String),

    #[error("Invalid option: {0}")]
    InvalidOption(String),
}

/// bemfa device families. The topic suffix is derived from this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Light,
    Switch,
    Sensor,
    Climate,
    Cover,
    Fan,
    BinarySensor,
}

impl DeviceType {
    pub fn topic_suffix(&self) -> &'static str {
        match self {
            DeviceType::Light => "002",
            DeviceType::Fan => "003",
            DeviceType::Sensor | DeviceType::BinarySensor => "004",
            DeviceType::Climate => "005",
            DeviceType::Switch => "006",
            DeviceType::Cover => "009",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Light => write!(f, "light"),
            DeviceType::Switch => write!(f, "switch"),
            DeviceType::Sensor => write!(f, "sensor"),
            DeviceType::Climate => write!(f, "climate"),
            DeviceType::Cover => write!(f, "cover"),
            DeviceType::Fan => write!(f, "fan"),
            DeviceType::BinarySensor => write!(f, "binary_sensor"),
        }
    }
}

/// Produces the token of one slot from the current state.
pub type Generator<'a> = Box<dyn Fn(&EntityState) -> Token + 'a>;

type Builder<'a> = Box<dyn Fn(&[Token], &Attributes) -> Option<Command> + 'a>;

pub fn generator<'a>(f: impl Fn(&EntityState) -> Token + 'a) -> Generator<'a> {
    Box::new(f)
}

/// Owns the slot range `[start, end)` of an inbound message. The builder
/// receives the inbound tokens of that range (index 0 is slot `start`) and
/// returns `None` when it cannot make sense of them.
pub struct Resolver<'a> {
    pub start: usize,
    pub end: usize,
    build: Builder<'a>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        start: usize,
        end: usize,
        build: impl Fn(&[Token], &Attributes) -> Option<Command> + 'a,
    ) -> Self {
        Self {
            start,
            end,
            build: Box::new(build),
        }
    }

    pub fn build(&self, msg: &[Token], attributes: &Attributes) -> Option<Command> {
        (self.build)(msg, attributes)
    }
}

impl fmt::Debug for Resolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Resolver[{}..{})", self.start, self.end)
    }
}

/// One bemfa device protocol.
pub trait DeviceCodec: Send + Sync + fmt::Debug {
    fn device_type(&self) -> DeviceType;

    /// Slot generators in wire order.
    fn generators(&self) -> Vec<Generator<'_>>;

    /// Inbound resolvers in priority order. Read-only devices have none.
    fn resolvers(&self) -> Vec<Resolver<'_>> {
        Vec::new()
    }

    /// Attribute key to member entity id, for codecs that aggregate other
    /// entities into a synthetic state. Empty means the codec reads the
    /// synced entity itself.
    fn sources(&self) -> Vec<(&'static str, &str)> {
        Vec::new()
    }
}

/// Result of decoding an inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub tokens: TokenSequence,
    pub command: Option<Command>,
}

pub fn encode(codec: &dyn DeviceCodec, state: &EntityState) -> TokenSequence {
    codec.generators().iter().map(|slot| slot(state)).collect()
}

/// Parses `raw` and diffs it against the encoding of `current`.
pub fn decode(codec: &dyn DeviceCodec, raw: &str, current: &EntityState) -> Decoded {
    let tokens = TokenSequence::parse(raw);
    let baseline = encode(codec, current);
    let command = resolve(codec, &tokens, &baseline, &current.attributes);
    Decoded { tokens, command }
}

/// Runs the resolvers against a parsed message. Each range is compared with
/// the baseline truncated to the shorter of both sequences; the first range
/// that differs and builds a command wins.
pub fn resolve(
    codec: &dyn DeviceCodec,
    inbound: &TokenSequence,
    baseline: &TokenSequence,
    attributes: &Attributes,
) -> Option<Command> {
    for resolver in codec.resolvers() {
        let end = resolver.end.min(inbound.len()).min(baseline.len());
        if resolver.start >= end {
            continue;
        }
        let range = resolver.start..end;
        if inbound.slice(range.clone()) == baseline.slice(range) {
            continue;
        }
        let msg = inbound.slice(resolver.start..resolver.end);
        match resolver.build(msg, attributes) {
            Some(command) => return Some(command),
            None => tracing::debug!(
                "{} resolver {:?} could not evaluate '{}'",
                codec.device_type(),
                resolver,
                inbound
            ),
        }
    }
    None
}
