use super::{generator, CodecError, DeviceCodec, DeviceType, Generator, SyncConfig, Token};
use crate::entity::{AttributeExt, STATE_ON, STATE_UNAVAILABLE, STATE_UNKNOWN};

/// Pseudo-domain of area aggregates (`area.<area_id>`).
pub const AREA_DOMAIN: &str = "area";

const SENSOR_DOMAIN: &str = "sensor";
const SLOT_COUNT: usize = 7;
const BINARY_SLOT: usize = 3;

/// Measurement positions of a bemfa sensor message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorSlot {
    Temperature,
    Humidity,
    Illuminance,
    Pm25,
    Co2,
}

impl SensorSlot {
    pub const ALL: [SensorSlot; 5] = [
        SensorSlot::Temperature,
        SensorSlot::Humidity,
        SensorSlot::Illuminance,
        SensorSlot::Pm25,
        SensorSlot::Co2,
    ];

    /// Option key naming the member entity of this slot.
    pub fn key(&self) -> &'static str {
        match self {
            SensorSlot::Temperature => "temperature",
            SensorSlot::Humidity => "humidity",
            SensorSlot::Illuminance => "illuminance",
            SensorSlot::Pm25 => "pm25",
            SensorSlot::Co2 => "co2",
        }
    }

    /// Host `device_class` of sensors eligible for this slot.
    pub fn device_class(&self) -> &'static str {
        match self {
            SensorSlot::Co2 => "carbon_dioxide",
            other => other.key(),
        }
    }

    /// Wire position. Slot 0 leads and slot 3 is shared with binary sensors.
    pub fn position(&self) -> usize {
        match self {
            SensorSlot::Temperature => 1,
            SensorSlot::Humidity => 2,
            SensorSlot::Illuminance => 4,
            SensorSlot::Pm25 => 5,
            SensorSlot::Co2 => 6,
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.key() == key)
    }

    pub fn from_device_class(class: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|slot| slot.device_class() == class)
    }
}

/// Aggregates one sensor per measurement of an area. The descriptor feeds it
/// a synthetic state whose attributes hold each member's raw state under the
/// slot key.
#[derive(Debug, Clone, Default)]
pub struct SensorCodec {
    members: Vec<(SensorSlot, String)>,
}

impl SensorCodec {
    pub fn from_config(config: &SyncConfig) -> Result<Self, CodecError> {
        let mut members = Vec::new();
        for (key, entity_id) in config.iter() {
            let slot = SensorSlot::from_key(key)
                .ok_or_else(|| CodecError::UnknownOption(key.to_string()))?;
            let is_sensor = entity_id
                .split_once('.')
                .is_some_and(|(domain, object)| domain == SENSOR_DOMAIN && !object.is_empty());
            if !is_sensor {
                return Err(CodecError::InvalidOption(format!(
                    "{}: '{}' is not a sensor entity",
                    key, entity_id
                )));
            }
            members.push((slot, entity_id.to_string()));
        }
        members.sort_by_key(|(slot, _)| slot.position());
        Ok(Self { members })
    }
}

/// Member state as the host reports it; only surrounding whitespace is
/// removed.
fn reading(value: Option<&str>) -> Token {
    match value.map(str::trim) {
        Some(STATE_UNAVAILABLE) | Some(STATE_UNKNOWN) | Some("") | None => Token::Absent,
        Some(raw) => Token::parse(raw),
    }
}

impl DeviceCodec for SensorCodec {
    fn device_type(&self) -> DeviceType {
        DeviceType::Sensor
    }

    fn generators(&self) -> Vec<Generator<'_>> {
        (0..SLOT_COUNT)
            .map(|position| {
                let slot = SensorSlot::ALL
                    .into_iter()
                    .find(|slot| slot.position() == position);
                generator(move |s| match slot {
                    Some(slot) => reading(s.attributes.text(slot.key())),
                    None => Token::Absent,
                })
            })
            .collect()
    }

    fn sources(&self) -> Vec<(&'static str, &str)> {
        self.members
            .iter()
            .map(|(slot, entity_id)| (slot.key(), entity_id.as_str()))
            .collect()
    }
}

/// Binary sensors only fill the fourth sensor position.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinarySensorCodec;

impl DeviceCodec for BinarySensorCodec {
    fn device_type(&self) -> DeviceType {
        DeviceType::BinarySensor
    }

    fn generators(&self) -> Vec<Generator<'_>> {
        let mut slots: Vec<Generator<'_>> = (0..BINARY_SLOT)
            .map(|_| generator(|_| Token::Absent))
            .collect();
        slots.push(generator(|s| Token::on_off(s.state == STATE_ON)));
        slots
    }
}
