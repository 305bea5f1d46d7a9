use super::{generator, Command, DeviceCodec, DeviceType, Generator, Resolver, Token};
use super::{MSG_OFF, MSG_ON};
use crate::entity::{AttributeExt, STATE_ON};

const DOMAIN: &str = "fan";
const ATTR_PERCENTAGE: &str = "percentage";
const ATTR_PERCENTAGE_STEP: &str = "percentage_step";
const ATTR_OSCILLATING: &str = "oscillating";

/// bemfa fans expose at most four speeds.
pub const MAX_FAN_SPEED: i64 = 4;

/// `power#speed#oscillating`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FanCodec;

fn percentage_step(attributes: &crate::entity::Attributes) -> Option<f64> {
    attributes
        .number(ATTR_PERCENTAGE_STEP)
        .filter(|step| *step > 0.0)
}

impl DeviceCodec for FanCodec {
    fn device_type(&self) -> DeviceType {
        DeviceType::Fan
    }

    fn generators(&self) -> Vec<Generator<'_>> {
        vec![
            generator(|s| Token::on_off(s.state == STATE_ON)),
            generator(|s| {
                let percentage = s.attributes.number(ATTR_PERCENTAGE);
                let step = percentage_step(&s.attributes);
                match (percentage, step) {
                    (Some(pct), Some(step)) => {
                        Token::Int(((pct / step).round_ties_even() as i64).min(MAX_FAN_SPEED))
                    }
                    _ => Token::Absent,
                }
            }),
            generator(|s| {
                s.attributes
                    .flag(ATTR_OSCILLATING)
                    .map(i64::from)
                    .into()
            }),
        ]
    }

    fn resolvers(&self) -> Vec<Resolver<'_>> {
        vec![
            Resolver::new(0, 2, |msg, attributes| {
                let power = msg.first().and_then(Token::as_text);
                if power == Some(MSG_OFF) {
                    return Some(Command::new(DOMAIN, "turn_off"));
                }
                let speed = msg.get(1).and_then(Token::as_int);
                match (speed, percentage_step(attributes)) {
                    (Some(speed), Some(step)) => {
                        let pct = (speed.max(1) as f64 * step).min(100.0).round() as i64;
                        Some(Command::new(DOMAIN, "set_percentage").with(ATTR_PERCENTAGE, pct))
                    }
                    _ if power == Some(MSG_ON) => Some(Command::new(DOMAIN, "turn_on")),
                    _ => None,
                }
            }),
            Resolver::new(2, 3, |msg, _| {
                let oscillating = msg.first()?.as_int()?;
                Some(Command::new(DOMAIN, "oscillate").with(ATTR_OSCILLATING, oscillating == 1))
            }),
        ]
    }
}
