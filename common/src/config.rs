use serde::{Deserialize, Serialize};
use smart_leds::RGB8;

use crate::color;

pub const DEFAULT_TIMEZONE_RULE: &str = "CET-1CEST,M3.5.0,M10.5.0/3";
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    pub wifi_connect_attempts: u32,
    pub wifi_retry_delay_ms: u64,
    pub time_sync_attempts: u32,
    pub time_sync_retry_delay_ms: u64,
    pub credential_restart_delay_ms: u64,
    pub factory_reset_delay_ms: u64,
    pub status_poll_interval_ms: u64,
    pub manual_tick_interval_ms: u64,
    pub animation_step_ms: u64,
    pub startup_animation_step_ms: u64,
    pub access_point_ssid: String,
    pub mdns_hostname: String,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            wifi_connect_attempts: 20,
            wifi_retry_delay_ms: 500,
            time_sync_attempts: 10,
            time_sync_retry_delay_ms: 500,
            credential_restart_delay_ms: 8_000,
            factory_reset_delay_ms: 1_000,
            status_poll_interval_ms: 2_000,
            manual_tick_interval_ms: 1_000,
            animation_step_ms: 120,
            startup_animation_step_ms: 60,
            access_point_ssid: "BinaryClock-Setup".to_string(),
            mdns_hostname: "binaryclock".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSettings {
    #[serde(rename = "timezoneRule")]
    pub timezone_rule: String,
    pub brightness: u8,
    #[serde(rename = "hourColor", with = "color::hex")]
    pub hour_color: RGB8,
    #[serde(rename = "minuteColor", with = "color::hex")]
    pub minute_color: RGB8,
    #[serde(rename = "secondColor", with = "color::hex")]
    pub second_color: RGB8,
    #[serde(rename = "use24Hour")]
    pub use_24_hour: bool,
    #[serde(rename = "manualMode")]
    pub manual_mode: bool,
    #[serde(rename = "manualHour")]
    pub manual_hour: u8,
    #[serde(rename = "manualMinute")]
    pub manual_minute: u8,
    #[serde(rename = "manualSecond")]
    pub manual_second: u8,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            timezone_rule: DEFAULT_TIMEZONE_RULE.to_string(),
            brightness: 40,
            hour_color: RGB8 { r: 255, g: 0, b: 0 },
            minute_color: RGB8 { r: 0, g: 255, b: 0 },
            second_color: RGB8 { r: 0, g: 0, b: 255 },
            use_24_hour: true,
            manual_mode: false,
            manual_hour: 12,
            manual_minute: 0,
            manual_second: 0,
        }
    }
}

impl ClockSettings {
    pub fn sanitize(&mut self) {
        self.brightness = self.brightness.max(1);
        self.manual_hour = self.manual_hour.min(23);
        self.manual_minute = self.manual_minute.min(59);
        self.manual_second = self.manual_second.min(59);
        if self.timezone_rule.trim().is_empty() {
            self.timezone_rule = DEFAULT_TIMEZONE_RULE.to_string();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCredentials {
    pub ssid: String,
    pub password: String,
}

impl NetworkCredentials {
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }

    pub fn is_provisioned(&self) -> bool {
        !self.ssid.trim().is_empty()
    }
}
