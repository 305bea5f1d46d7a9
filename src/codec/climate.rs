use super::{generator, Command, DeviceCodec, DeviceType, Generator, Resolver, Token};
use super::{CodecError, LookupTable, SyncConfig, MSG_OFF, MSG_ON};
use crate::entity::{AttributeExt, Attributes, STATE_OFF};

const DOMAIN: &str = "climate";
const ATTR_HVAC_MODE: &str = "hvac_mode";
const ATTR_TEMPERATURE: &str = "temperature";
const ATTR_FAN_MODE: &str = "fan_mode";
const ATTR_SWING_MODE: &str = "swing_mode";

pub const OPTION_FAN_MODES: &str = "fan_modes";
pub const OPTION_SWING_MODES: &str = "swing_modes";

/// HVAC modes bemfa knows, in wire order (index + 1 on the wire).
pub const HVAC_MODES: [&str; 5] = ["auto", "cool", "heat", "fan_only", "dry"];

/// `power#mode#temperature#fan#swing_h#swing_v`.
///
/// Fan and swing slots need user lookup tables (`fan_modes = "auto:0,low:1"`,
/// `swing_modes = "off:0/0,both:1/1"`) because every climate integration
/// names its modes differently.
#[derive(Debug, Clone, Default)]
pub struct ClimateCodec {
    fan_modes: LookupTable<i64>,
    swing_modes: LookupTable<(i64, i64)>,
}

impl ClimateCodec {
    pub fn from_config(config: &SyncConfig) -> Result<Self, CodecError> {
        config.ensure_keys(&[OPTION_FAN_MODES, OPTION_SWING_MODES])?;
        let fan_modes = match config.get(OPTION_FAN_MODES) {
            Some(raw) => LookupTable::parse(OPTION_FAN_MODES, raw, |v| v.parse::<i64>().ok())?,
            None => LookupTable::default(),
        };
        let swing_modes = match config.get(OPTION_SWING_MODES) {
            Some(raw) => LookupTable::parse(OPTION_SWING_MODES, raw, parse_swing)?,
            None => LookupTable::default(),
        };
        Ok(Self {
            fan_modes,
            swing_modes,
        })
    }

    fn current_swing(&self, attributes: &Attributes) -> Option<(i64, i64)> {
        self.swing_modes.encode(attributes.text(ATTR_SWING_MODE)?)
    }
}

fn parse_swing(raw: &str) -> Option<(i64, i64)> {
    let (horizontal, vertical) = raw.split_once('/')?;
    Some((horizontal.trim().parse().ok()?, vertical.trim().parse().ok()?))
}

impl DeviceCodec for ClimateCodec {
    fn device_type(&self) -> DeviceType {
        DeviceType::Climate
    }

    fn generators(&self) -> Vec<Generator<'_>> {
        vec![
            generator(|s| Token::on_off(s.state != STATE_OFF)),
            generator(|s| {
                HVAC_MODES
                    .iter()
                    .position(|mode| *mode == s.state)
                    .map(|i| i as i64 + 1)
                    .into()
            }),
            generator(|s| {
                s.attributes
                    .number(ATTR_TEMPERATURE)
                    .map(|t| t.round_ties_even() as i64)
                    .into()
            }),
            generator(|s| {
                s.attributes
                    .text(ATTR_FAN_MODE)
                    .and_then(|mode| self.fan_modes.encode(mode))
                    .into()
            }),
            generator(|s| self.current_swing(&s.attributes).map(|(h, _)| h).into()),
            generator(|s| self.current_swing(&s.attributes).map(|(_, v)| v).into()),
        ]
    }

    fn resolvers(&self) -> Vec<Resolver<'_>> {
        vec![
            Resolver::new(0, 2, |msg, _| {
                let power = msg.first().and_then(Token::as_text);
                if power == Some(MSG_OFF) {
                    return Some(Command::new(DOMAIN, "turn_off"));
                }
                match msg.get(1).filter(|t| !t.is_absent()) {
                    Some(mode) => {
                        let index = mode
                            .as_int()
                            .filter(|i| (1..=HVAC_MODES.len() as i64).contains(i))?;
                        Some(
                            Command::new(DOMAIN, "set_hvac_mode")
                                .with(ATTR_HVAC_MODE, HVAC_MODES[index as usize - 1]),
                        )
                    }
                    None if power == Some(MSG_ON) => Some(Command::new(DOMAIN, "turn_on")),
                    None => None,
                }
            }),
            Resolver::new(2, 3, |msg, _| {
                let temperature = msg.first()?.as_int()?;
                Some(Command::new(DOMAIN, "set_temperature").with(ATTR_TEMPERATURE, temperature))
            }),
            Resolver::new(3, 4, |msg, _| {
                let mode = self.fan_modes.decode(msg.first()?.as_int()?)?;
                Some(Command::new(DOMAIN, "set_fan_mode").with(ATTR_FAN_MODE, mode))
            }),
            Resolver::new(4, 6, |msg, attributes| {
                let current = self.current_swing(attributes);
                let horizontal = msg
                    .first()
                    .and_then(Token::as_int)
                    .or(current.map(|(h, _)| h))?;
                let vertical = msg
                    .get(1)
                    .and_then(Token::as_int)
                    .or(current.map(|(_, v)| v))?;
                let mode = self.swing_modes.decode((horizontal, vertical))?;
                Some(Command::new(DOMAIN, "set_swing_mode").with(ATTR_SWING_MODE, mode))
            }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, encode};
    use crate::entity::EntityState;

    fn aircon() -> ClimateCodec {
        let config = SyncConfig::new()
            .with(OPTION_FAN_MODES, "auto:0,low:1,medium:2,high:3")
            .with(OPTION_SWING_MODES, "off:0/0,horizontal:1/0,vertical:0/1,both:1/1");
        ClimateCodec::from_config(&config).unwrap()
    }

    fn cooling() -> EntityState {
        EntityState::new("climate.bedroom", "cool")
            .with_attr(ATTR_TEMPERATURE, 24.4)
            .with_attr(ATTR_FAN_MODE, "low")
            .with_attr(ATTR_SWING_MODE, "vertical")
    }

    #[test]
    fn off_climate_is_bare_off() {
        let state = EntityState::new("climate.hall", "off");
        assert_eq!(encode(&ClimateCodec::default(), &state).to_message(), "off");
    }

    #[test]
    fn encodes_mode_temperature_fan_and_swing() {
        assert_eq!(encode(&aircon(), &cooling()).to_message(), "on#2#24#1#0#1");
    }

    #[test]
    fn mode_index_sets_hvac_mode() {
        let state = EntityState::new("climate.hall", "off");
        let command = decode(&ClimateCodec::default(), "on#2", &state).command.unwrap();
        assert_eq!(command.service, "set_hvac_mode");
        assert_eq!(command.data[ATTR_HVAC_MODE], "cool");
    }

    #[test]
    fn bare_on_only_turns_on() {
        let state = EntityState::new("climate.hall", "off");
        let command = decode(&ClimateCodec::default(), "on", &state).command.unwrap();
        assert_eq!(command.service, "turn_on");
        assert!(command.data.is_empty());
    }

    #[test]
    fn temperature_change_sets_temperature() {
        let command = decode(&aircon(), "on#2#26#1#0#1", &cooling()).command.unwrap();
        assert_eq!(command.service, "set_temperature");
        assert_eq!(command.data[ATTR_TEMPERATURE], 26);
    }

    #[test]
    fn fan_and_swing_use_reverse_lookup() {
        let command = decode(&aircon(), "on#2#24#3#0#1", &cooling()).command.unwrap();
        assert_eq!(command.data[ATTR_FAN_MODE], "high");

        let command = decode(&aircon(), "on#2#24#1#1#1", &cooling()).command.unwrap();
        assert_eq!(command.service, "set_swing_mode");
        assert_eq!(command.data[ATTR_SWING_MODE], "both");
    }

    #[test]
    fn swing_without_vertical_keeps_current_vertical() {
        let command = decode(&aircon(), "on#2#24#1#1", &cooling()).command.unwrap();
        assert_eq!(command.data[ATTR_SWING_MODE], "both");
    }

    #[test]
    fn out_of_range_mode_is_ignored() {
        let state = EntityState::new("climate.hall", "heat");
        assert_eq!(decode(&ClimateCodec::default(), "on#9", &state).command, None);
    }

    #[test]
    fn half_degrees_round_to_even() {
        for (target, expected) in [(22.5, "on#3#22"), (23.5, "on#3#24"), (24.5, "on#3#24")] {
            let state = EntityState::new("climate.hall", "heat").with_attr(ATTR_TEMPERATURE, target);
            assert_eq!(encode(&ClimateCodec::default(), &state).to_message(), expected);
        }
    }

    #[test]
    fn malformed_tables_are_rejected() {
        let config = SyncConfig::new().with(OPTION_SWING_MODES, "both:1");
        assert!(ClimateCodec::from_config(&config).is_err());
        let config = SyncConfig::new().with("presets", "eco:1");
        assert!(matches!(
            ClimateCodec::from_config(&config),
            Err(CodecError::UnknownOption(_))
        ));
    }
}
