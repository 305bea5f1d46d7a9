use super::{generator, Command, DeviceCodec, DeviceType, Generator, Resolver, Token};
use super::{MSG_OFF, MSG_ON};
use crate::entity::{AttributeExt, ATTR_SUPPORTED_FEATURES, STATE_ON};

/// Domains bridged as a plain bemfa switch.
pub const PLAIN_SWITCH_DOMAINS: [&str; 7] = [
    "switch",
    "script",
    "automation",
    "input_boolean",
    "humidifier",
    "remote",
    "siren",
];

const HOMEASSISTANT_DOMAIN: &str = "homeassistant";

const VACUUM_START: i64 = 8192;
const VACUUM_RETURN_HOME: i64 = 16;
const VACUUM_STOP: i64 = 8;

/// How a domain maps onto a single on/off slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchVariant {
    Plain,
    Camera,
    MediaPlayer,
    /// `on` means unlocked.
    Lock,
    /// Always reports off so it can be triggered again.
    Scene,
    Group,
    Vacuum,
}

impl SwitchVariant {
    pub fn for_domain(domain: &str) -> Option<Self> {
        let variant = match domain {
            "camera" => SwitchVariant::Camera,
            "media_player" => SwitchVariant::MediaPlayer,
            "lock" => SwitchVariant::Lock,
            "scene" => SwitchVariant::Scene,
            "group" => SwitchVariant::Group,
            "vacuum" => SwitchVariant::Vacuum,
            d if PLAIN_SWITCH_DOMAINS.contains(&d) => SwitchVariant::Plain,
            _ => return None,
        };
        Some(variant)
    }

    fn is_on(&self, state: &str) -> bool {
        match self {
            SwitchVariant::Plain | SwitchVariant::Group => state == STATE_ON,
            SwitchVariant::Camera => state != "idle",
            SwitchVariant::MediaPlayer => state == "playing",
            SwitchVariant::Lock => state != "locked",
            SwitchVariant::Scene => false,
            SwitchVariant::Vacuum => state == STATE_ON || state == "cleaning",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwitchCodec {
    domain: String,
    variant: SwitchVariant,
}

impl SwitchCodec {
    pub fn new(domain: &str) -> Option<Self> {
        Some(Self {
            domain: domain.to_string(),
            variant: SwitchVariant::for_domain(domain)?,
        })
    }

    fn command(&self, on: bool, features: i64) -> Command {
        let service = match (self.variant, on) {
            (SwitchVariant::Lock, true) => "unlock",
            (SwitchVariant::Lock, false) => "lock",
            (SwitchVariant::Vacuum, true) if features & VACUUM_START != 0 => "start",
            (SwitchVariant::Vacuum, false) if features & VACUUM_RETURN_HOME != 0 => {
                "return_to_base"
            }
            (SwitchVariant::Vacuum, false) if features & VACUUM_STOP != 0 => "stop",
            (_, true) => "turn_on",
            (_, false) => "turn_off",
        };
        let domain = match self.variant {
            SwitchVariant::Group => HOMEASSISTANT_DOMAIN,
            _ => self.domain.as_str(),
        };
        Command::new(domain, service)
    }
}

impl DeviceCodec for SwitchCodec {
    fn device_type(&self) -> DeviceType {
        DeviceType::Switch
    }

    fn generators(&self) -> Vec<Generator<'_>> {
        vec![generator(|s| Token::on_off(self.variant.is_on(&s.state)))]
    }

    fn resolvers(&self) -> Vec<Resolver<'_>> {
        vec![Resolver::new(0, 1, |msg, attributes| {
            let on = match msg.first()?.as_text()? {
                MSG_ON => true,
                MSG_OFF => false,
                _ => return None,
            };
            let features = attributes.integer(ATTR_SUPPORTED_FEATURES).unwrap_or(0);
            Some(self.command(on, features))
        })]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode, encode};
    use crate::entity::EntityState;

    fn codec(domain: &str) -> SwitchCodec {
        SwitchCodec::new(domain).unwrap()
    }

    #[test]
    fn domain_specific_states_map_to_on_off() {
        let cases = [
            ("camera", "idle", "off"),
            ("camera", "streaming", "on"),
            ("media_player", "playing", "on"),
            ("media_player", "paused", "off"),
            ("lock", "locked", "off"),
            ("lock", "unlocked", "on"),
            ("scene", "2024-01-01T00:00:00", "off"),
            ("vacuum", "cleaning", "on"),
            ("vacuum", "docked", "off"),
            ("input_boolean", "on", "on"),
        ];
        for (domain, state, expected) in cases {
            let entity = EntityState::new(format!("{}.x", domain), state);
            assert_eq!(encode(&codec(domain), &entity).to_message(), expected, "{domain} {state}");
        }
    }

    #[test]
    fn lock_on_means_unlock() {
        let locked = EntityState::new("lock.front", "locked");
        let command = decode(&codec("lock"), "on", &locked).command.unwrap();
        assert_eq!((command.domain.as_str(), command.service.as_str()), ("lock", "unlock"));
    }

    #[test]
    fn group_switches_through_homeassistant() {
        let group = EntityState::new("group.downstairs", "off");
        let command = decode(&codec("group"), "on", &group).command.unwrap();
        assert_eq!(command.domain, "homeassistant");
        assert_eq!(command.service, "turn_on");
    }

    #[test]
    fn vacuum_prefers_advertised_services() {
        let docked = EntityState::new("vacuum.robo", "docked")
            .with_attr(ATTR_SUPPORTED_FEATURES, VACUUM_START | VACUUM_RETURN_HOME);
        let command = decode(&codec("vacuum"), "on", &docked).command.unwrap();
        assert_eq!(command.service, "start");

        let cleaning = EntityState::new("vacuum.robo", "cleaning")
            .with_attr(ATTR_SUPPORTED_FEATURES, VACUUM_STOP);
        let command = decode(&codec("vacuum"), "off", &cleaning).command.unwrap();
        assert_eq!(command.service, "stop");

        let basic = EntityState::new("vacuum.robo", "on");
        let command = decode(&codec("vacuum"), "off", &basic).command.unwrap();
        assert_eq!(command.service, "turn_off");
    }

    #[test]
    fn scene_can_be_triggered_repeatedly() {
        let scene = EntityState::new("scene.movie", "2024-01-01T00:00:00");
        let first = decode(&codec("scene"), "on", &scene).command.unwrap();
        assert_eq!(first.service, "turn_on");
        assert!(decode(&codec("scene"), "on", &scene).command.is_some());
    }

    #[test]
    fn unknown_token_does_nothing() {
        let switch = EntityState::new("switch.pump", "on");
        assert_eq!(decode(&codec("switch"), "toggle", &switch).command, None);
        assert_eq!(decode(&codec("switch"), "on", &switch).command, None);
    }

    #[test]
    fn unsupported_domain_has_no_codec() {
        assert!(SwitchCodec::new("weather").is_none());
    }
}
