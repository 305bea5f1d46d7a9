use bemfa_bridge::codec::{
    decode, encode, ClimateCodec, CodecRegistry, CoverCodec, DeviceCodec, LightCodec, SyncConfig,
};
use bemfa_bridge::{DeviceType, EntityState, Topic};
use serde_json::json;

fn red_light() -> EntityState {
    EntityState::new("light.living_room", "on")
        .with_attr("brightness", 128)
        .with_attr("rgb_color", json!([255, 0, 0]))
        .with_attr("supported_color_modes", json!(["rgb"]))
}

#[test]
fn light_brightness_change_is_one_turn_on() {
    let codec = LightCodec;
    let state = red_light();
    assert_eq!(encode(&codec, &state).to_string(), "on#50#16711680");

    let decoded = decode(&codec, "on#75#16711680", &state);
    let command = decoded.command.expect("brightness differs");
    assert_eq!(command.to_string(), "light.turn_on");
    assert_eq!(command.data["brightness_pct"], 75);
    assert_eq!(command.data["rgb_color"], json!([255, 0, 0]));
}

#[test]
fn cover_position_wins_over_power_toggle() {
    let codec = CoverCodec;
    let state = EntityState::new("cover.garage", "closed").with_attr("current_position", 0);
    assert_eq!(encode(&codec, &state).to_string(), "off#0");

    let command = decode(&codec, "on#100", &state).command.expect("position differs");
    assert_eq!(command.to_string(), "cover.set_cover_position");
    assert_eq!(command.data["position"], 100);
}

#[test]
fn climate_mode_and_bare_power() {
    let codec = ClimateCodec::from_config(&SyncConfig::new()).unwrap();
    let state = EntityState::new("climate.office", "off");
    assert_eq!(encode(&codec, &state).to_string(), "off");

    let command = decode(&codec, "on#2", &state).command.expect("mode differs");
    assert_eq!(command.to_string(), "climate.set_hvac_mode");
    assert_eq!(command.data["hvac_mode"], "cool");

    let command = decode(&codec, "on", &state).command.expect("power differs");
    assert_eq!(command.to_string(), "climate.turn_on");

    assert_eq!(decode(&codec, "off", &state).command, None);
}

#[test]
fn matching_message_is_a_no_op() {
    let registry = CodecRegistry::with_defaults();
    let plain = SyncConfig::new;
    let aircon = SyncConfig::new()
        .with("fan_modes", "auto:0,low:1,high:2")
        .with("swing_modes", "off:0/0,vertical:0/1,both:1/1");
    let living = SyncConfig::new()
        .with("temperature", "sensor.living_temp")
        .with("humidity", "sensor.living_rh")
        .with("co2", "sensor.living_co2");
    let cases = [
        (red_light(), plain()),
        (
            EntityState::new("cover.blind", "open").with_attr("current_position", 40),
            plain(),
        ),
        (
            EntityState::new("fan.ceiling", "on")
                .with_attr("percentage", 50)
                .with_attr("percentage_step", 25)
                .with_attr("oscillating", true),
            plain(),
        ),
        (
            EntityState::new("climate.hall", "heat").with_attr("temperature", 21),
            plain(),
        ),
        (
            EntityState::new("climate.bedroom", "cool")
                .with_attr("temperature", 24)
                .with_attr("fan_mode", "low")
                .with_attr("swing_mode", "vertical"),
            aircon,
        ),
        (
            EntityState::new("area.living", "")
                .with_attr("temperature", "21.5")
                .with_attr("humidity", "40")
                .with_attr("co2", "007"),
            living,
        ),
        (EntityState::new("binary_sensor.hall_motion", "on"), plain()),
        (EntityState::new("lock.front_door", "locked"), plain()),
        (EntityState::new("switch.heater", "on"), plain()),
    ];

    for (state, config) in cases {
        let codec: Box<dyn DeviceCodec> = registry.build(state.domain(), &config).unwrap();
        let encoded = encode(codec.as_ref(), &state);
        assert!(!encoded.is_empty(), "{}", state.entity_id);
        let decoded = decode(codec.as_ref(), &encoded.to_string(), &state);
        assert_eq!(decoded.tokens, encoded, "{}", state.entity_id);
        assert_eq!(decoded.command, None, "{}", state.entity_id);
    }
}

#[test]
fn extended_climate_and_area_messages() {
    let config = SyncConfig::new()
        .with("fan_modes", "auto:0,low:1,high:2")
        .with("swing_modes", "off:0/0,vertical:0/1,both:1/1");
    let codec = ClimateCodec::from_config(&config).unwrap();
    let state = EntityState::new("climate.bedroom", "cool")
        .with_attr("temperature", 24)
        .with_attr("fan_mode", "low")
        .with_attr("swing_mode", "vertical");
    assert_eq!(encode(&codec, &state).to_string(), "on#2#24#1#0#1");

    let registry = CodecRegistry::with_defaults();
    let living = SyncConfig::new()
        .with("temperature", "sensor.living_temp")
        .with("humidity", "sensor.living_rh")
        .with("co2", "sensor.living_co2");
    let area = registry.build("area", &living).unwrap();
    let snapshot = EntityState::new("area.living", "")
        .with_attr("temperature", "21.5")
        .with_attr("humidity", "40")
        .with_attr("co2", "007");
    assert_eq!(encode(area.as_ref(), &snapshot).to_string(), "#21.5#40####007");
}

#[test]
fn topic_depends_on_entity_and_family() {
    let registry = CodecRegistry::with_defaults();
    let codec = registry.build("lock", &SyncConfig::new()).unwrap();
    assert_eq!(codec.device_type(), DeviceType::Switch);

    let topic = Topic::for_entity("lock.front_door", codec.device_type());
    assert!(topic.as_str().starts_with("hass"));
    assert!(topic.as_str().ends_with("006"));
    assert_eq!(topic.publish_topic(), format!("{}/set", topic));
}
