use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use smart_leds::RGB8;
use thiserror::Error;

use crate::{clock::TimeOfDay, color, config::ClockSettings};

#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate<T> {
    Absent,
    Valid(T),
    Invalid,
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for FieldUpdate<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        if value.is_null() {
            return Ok(Self::Absent);
        }
        Ok(parse_lenient(value).map_or(Self::Invalid, Self::Valid))
    }
}

fn parse_lenient<T: DeserializeOwned>(value: Value) -> Option<T> {
    if let Value::String(raw) = &value {
        if let Ok(parsed) = serde_json::from_str::<T>(raw.trim()) {
            return Some(parsed);
        }
    }
    serde_json::from_value(value).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexColor(pub RGB8);

impl<'de> Deserialize<'de> for HexColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        color::hex::deserialize(deserializer).map(Self)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SettingsUpdate {
    #[serde(rename = "timezoneRule")]
    pub timezone_rule: FieldUpdate<String>,
    pub brightness: FieldUpdate<u8>,
    #[serde(rename = "hourColor")]
    pub hour_color: FieldUpdate<HexColor>,
    #[serde(rename = "minuteColor")]
    pub minute_color: FieldUpdate<HexColor>,
    #[serde(rename = "secondColor")]
    pub second_color: FieldUpdate<HexColor>,
    #[serde(rename = "use24Hour")]
    pub use_24_hour: FieldUpdate<bool>,
    #[serde(rename = "manualMode")]
    pub manual_mode: FieldUpdate<bool>,
    #[serde(rename = "manualHour")]
    pub manual_hour: FieldUpdate<u8>,
    #[serde(rename = "manualMinute")]
    pub manual_minute: FieldUpdate<u8>,
    #[serde(rename = "manualSecond")]
    pub manual_second: FieldUpdate<u8>,
}

impl SettingsUpdate {
    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateOutcome {
    pub applied: Vec<&'static str>,
    pub rejected: Vec<&'static str>,
}

impl UpdateOutcome {
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }

    pub fn touched(&self, field: &str) -> bool {
        self.applied.iter().any(|name| *name == field)
    }

    fn apply<T>(
        &mut self,
        name: &'static str,
        update: FieldUpdate<T>,
        accept: impl FnOnce(&T) -> bool,
        target: &mut T,
    ) {
        match update {
            FieldUpdate::Absent => {}
            FieldUpdate::Valid(value) if accept(&value) => {
                *target = value;
                self.applied.push(name);
            }
            FieldUpdate::Valid(_) | FieldUpdate::Invalid => self.rejected.push(name),
        }
    }
}

fn color_field(update: FieldUpdate<HexColor>) -> FieldUpdate<RGB8> {
    match update {
        FieldUpdate::Absent => FieldUpdate::Absent,
        FieldUpdate::Valid(HexColor(rgb)) => FieldUpdate::Valid(rgb),
        FieldUpdate::Invalid => FieldUpdate::Invalid,
    }
}

impl ClockSettings {
    /// Applies every acceptable field of `update`. The timezone rule is passed
    /// through even while manual mode is on.
    pub fn apply_update(&mut self, update: SettingsUpdate) -> UpdateOutcome {
        let mut outcome = UpdateOutcome::default();

        outcome.apply(
            "timezoneRule",
            update.timezone_rule.map(|rule| rule.trim().to_string()),
            |rule| !rule.is_empty() && rule.len() <= 64,
            &mut self.timezone_rule,
        );
        outcome.apply(
            "brightness",
            update.brightness,
            |value| *value >= 1,
            &mut self.brightness,
        );
        outcome.apply(
            "hourColor",
            color_field(update.hour_color),
            |_| true,
            &mut self.hour_color,
        );
        outcome.apply(
            "minuteColor",
            color_field(update.minute_color),
            |_| true,
            &mut self.minute_color,
        );
        outcome.apply(
            "secondColor",
            color_field(update.second_color),
            |_| true,
            &mut self.second_color,
        );
        outcome.apply("use24Hour", update.use_24_hour, |_| true, &mut self.use_24_hour);
        outcome.apply("manualMode", update.manual_mode, |_| true, &mut self.manual_mode);
        outcome.apply(
            "manualHour",
            update.manual_hour,
            |value| *value <= 23,
            &mut self.manual_hour,
        );
        outcome.apply(
            "manualMinute",
            update.manual_minute,
            |value| *value <= 59,
            &mut self.manual_minute,
        );
        outcome.apply(
            "manualSecond",
            update.manual_second,
            |value| *value <= 59,
            &mut self.manual_second,
        );

        outcome
    }

    pub fn manual_time(&self) -> TimeOfDay {
        TimeOfDay {
            hour: self.manual_hour.min(23),
            minute: self.manual_minute.min(59),
            second: self.manual_second.min(59),
        }
    }
}

impl<T> FieldUpdate<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FieldUpdate<U> {
        match self {
            Self::Absent => FieldUpdate::Absent,
            Self::Valid(value) => FieldUpdate::Valid(f(value)),
            Self::Invalid => FieldUpdate::Invalid,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ManualTimeError {
    #[error("manual time {hour}:{minute}:{second} is out of range")]
    OutOfRange { hour: u8, minute: u8, second: u8 },
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ManualTimeUpdate {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl ManualTimeUpdate {
    pub fn validate(self) -> Result<TimeOfDay, ManualTimeError> {
        TimeOfDay::new(self.hour, self.minute, self.second).ok_or(ManualTimeError::OutOfRange {
            hour: self.hour,
            minute: self.minute,
            second: self.second,
        })
    }
}
