use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const MQTT_HOST: &str = "bemfa.com";
pub const MQTT_PORT: u16 = 9501;
pub const MQTT_KEEPALIVE_SECS: u64 = 600;
pub const PING_INTERVAL_SECS: u64 = 30;
pub const PING_WINDOW_SECS: u64 = 10;
pub const MAX_MISSED_PINGS: u32 = 3;

/// Broker connection and heartbeat settings. Defaults talk to bemfa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub keepalive_secs: u64,
    pub ping_interval_secs: u64,
    /// How long to wait for our own ping to come back.
    pub ping_window_secs: u64,
    pub max_missed_pings: u32,
    pub reconnect_delay_secs: u64,
    pub connect_timeout_secs: u64,
    pub channel_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: MQTT_HOST.to_string(),
            port: MQTT_PORT,
            keepalive_secs: MQTT_KEEPALIVE_SECS,
            ping_interval_secs: PING_INTERVAL_SECS,
            ping_window_secs: PING_WINDOW_SECS,
            max_missed_pings: MAX_MISSED_PINGS,
            reconnect_delay_secs: 5,
            connect_timeout_secs: 10,
            channel_capacity: 100,
        }
    }
}

impl MqttConfig {
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    /// Never longer than the interval, so windows cannot overlap.
    pub fn ping_window(&self) -> Duration {
        Duration::from_secs(self.ping_window_secs.max(1)).min(self.ping_interval())
    }

    pub fn max_missed_pings(&self) -> u32 {
        self.max_missed_pings.max(1)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }
}
