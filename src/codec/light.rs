use serde_json::json;

use super::{generator, Command, DeviceCodec, DeviceType, Generator, Resolver, Token};
use super::{MSG_OFF, MSG_ON};
use crate::entity::{AttributeExt, STATE_ON};

const DOMAIN: &str = "light";

const ATTR_BRIGHTNESS: &str = "brightness";
const ATTR_BRIGHTNESS_PCT: &str = "brightness_pct";
const ATTR_COLOR_TEMP: &str = "color_temp";
const ATTR_MIN_MIREDS: &str = "min_mireds";
const ATTR_MAX_MIREDS: &str = "max_mireds";
const ATTR_RGB_COLOR: &str = "rgb_color";
const ATTR_SUPPORTED_COLOR_MODES: &str = "supported_color_modes";
const COLOR_MODE_COLOR_TEMP: &str = "color_temp";

/// `power#brightness_pct#color` where color is either a kelvin value or a
/// packed `0xRRGGBB` integer.
#[derive(Debug, Clone, Copy, Default)]
pub struct LightCodec;

impl DeviceCodec for LightCodec {
    fn device_type(&self) -> DeviceType {
        DeviceType::Light
    }

    fn generators(&self) -> Vec<Generator<'_>> {
        vec![
            generator(|s| Token::on_off(s.state == STATE_ON)),
            generator(|s| {
                s.attributes
                    .number(ATTR_BRIGHTNESS)
                    .map(|b| (b / 2.55).round_ties_even() as i64)
                    .into()
            }),
            generator(|s| {
                if let Some(mireds) = s.attributes.number(ATTR_COLOR_TEMP).filter(|m| *m > 0.0) {
                    return Token::Int((1_000_000.0 / mireds).floor() as i64);
                }
                pack_rgb(s.attributes.get(ATTR_RGB_COLOR)).into()
            }),
        ]
    }

    fn resolvers(&self) -> Vec<Resolver<'_>> {
        vec![Resolver::new(0, 3, |msg, attributes| {
            let power = msg.first().and_then(Token::as_text);
            if power == Some(MSG_OFF) {
                return Some(Command::new(DOMAIN, "turn_off"));
            }

            let mut command = Command::new(DOMAIN, "turn_on");
            let brightness = msg.get(1).and_then(Token::as_int);
            if let Some(pct) = brightness {
                command = command.with(ATTR_BRIGHTNESS_PCT, pct.clamp(0, 100));
            }
            let color = msg.get(2).and_then(Token::as_int);
            if let Some(value) = color {
                let supports_temp =
                    attributes.list_contains(ATTR_SUPPORTED_COLOR_MODES, COLOR_MODE_COLOR_TEMP);
                if supports_temp && value > 0 {
                    let mut mireds = 1_000_000 / value;
                    if let Some(min) = attributes.integer(ATTR_MIN_MIREDS) {
                        mireds = mireds.max(min);
                    }
                    if let Some(max) = attributes.integer(ATTR_MAX_MIREDS) {
                        mireds = mireds.min(max);
                    }
                    command = command.with(ATTR_COLOR_TEMP, mireds);
                } else {
                    let rgb = value.clamp(0, 0xFF_FFFF);
                    command = command.with(
                        ATTR_RGB_COLOR,
                        json!([rgb / 65536 % 256, rgb / 256 % 256, rgb % 256]),
                    );
                }
            }

            if power == Some(MSG_ON) || brightness.is_some() || color.is_some() {
                Some(command)
            } else {
                None
            }
        })]
    }
}

fn pack_rgb(value: Option<&serde_json::Value>) -> Option<i64> {
    let channels = value?.as_array()?;
    if channels.len() < 3 {
        return None;
    }
    let mut packed = 0;
    for channel in &channels[..3] {
        let c = channel.as_f64()?.round() as i64;
        packed = packed * 256 + c.clamp(0, 255);
    }
    Some(packed)
}
