use super::{generator, Command, DeviceCodec, DeviceType, Generator, Resolver, Token};
use super::{MSG_OFF, MSG_ON};
use crate::entity::AttributeExt;

const DOMAIN: &str = "cover";
const ATTR_CURRENT_POSITION: &str = "current_position";
const ATTR_POSITION: &str = "position";
const STATE_CLOSED: &str = "closed";

/// `power#position`. Power is `off` when fully closed.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoverCodec;

impl DeviceCodec for CoverCodec {
    fn device_type(&self) -> DeviceType {
        DeviceType::Cover
    }

    fn generators(&self) -> Vec<Generator<'_>> {
        vec![
            generator(|s| {
                let closed = match s.attributes.integer(ATTR_CURRENT_POSITION) {
                    Some(position) => position == 0,
                    None => s.state == STATE_CLOSED,
                };
                Token::on_off(!closed)
            }),
            generator(|s| s.attributes.integer(ATTR_CURRENT_POSITION).into()),
        ]
    }

    fn resolvers(&self) -> Vec<Resolver<'_>> {
        vec![Resolver::new(0, 2, |msg, _| {
            if let Some(position) = msg.get(1).and_then(Token::as_int) {
                return Some(
                    Command::new(DOMAIN, "set_cover_position")
                        .with(ATTR_POSITION, position.clamp(0, 100)),
                );
            }
            // anything besides on/off (bemfa sends `pause`) stops the cover
            let service = match msg.first()? {
                Token::Absent => return None,
                t if t.is(MSG_ON) => "open_cover",
                t if t.is(MSG_OFF) => "close_cover",
                _ => "stop_cover",
            };
            Some(Command::new(DOMAIN, service))
        })]
    }
}
