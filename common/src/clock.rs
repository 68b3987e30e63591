use chrono::Timelike;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8, second: u8) -> Option<Self> {
        if hour > 23 || minute > 59 || second > 59 {
            return None;
        }
        Some(Self {
            hour,
            minute,
            second,
        })
    }

    pub fn from_chrono<T: Timelike>(time: &T) -> Self {
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
            second: time.second().min(59) as u8,
        }
    }

    pub fn advance(&mut self) {
        self.second += 1;
        if self.second >= 60 {
            self.second = 0;
            self.minute += 1;
        }
        if self.minute >= 60 {
            self.minute = 0;
            self.hour += 1;
        }
        if self.hour >= 24 {
            self.hour = 0;
        }
    }

    pub fn display(self, use_24_hour: bool) -> DisplayTime {
        let is_pm = self.hour >= 12;
        let hour = if use_24_hour {
            self.hour
        } else {
            match self.hour % 12 {
                0 => 12,
                h => h,
            }
        };

        DisplayTime {
            hour,
            minute: self.minute,
            second: self.second,
            is_pm,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayTime {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub is_pm: bool,
}

impl DisplayTime {
    pub fn text(&self, use_24_hour: bool) -> String {
        if use_24_hour {
            format!("{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
        } else {
            let suffix = if self.is_pm { "PM" } else { "AM" };
            format!(
                "{:02}:{:02}:{:02} {suffix}",
                self.hour, self.minute, self.second
            )
        }
    }
}

pub const UNAVAILABLE_TEXT: &str = "--:--:--";

#[derive(Debug, Clone)]
pub struct ManualClock {
    time: TimeOfDay,
    last_advance_ms: u64,
    tick_interval_ms: u64,
}

impl ManualClock {
    pub fn new(time: TimeOfDay, now_ms: u64, tick_interval_ms: u64) -> Self {
        Self {
            time,
            last_advance_ms: now_ms,
            tick_interval_ms: tick_interval_ms.max(1),
        }
    }

    pub fn time(&self) -> TimeOfDay {
        self.time
    }

    /// Overwrites the time and restarts the tick so the next advance is a full
    /// interval away.
    pub fn set(&mut self, time: TimeOfDay, now_ms: u64) {
        self.time = time;
        self.last_advance_ms = now_ms;
    }

    pub fn poll(&mut self, now_ms: u64) -> bool {
        if now_ms.saturating_sub(self.last_advance_ms) < self.tick_interval_ms {
            return false;
        }
        self.time.advance();
        self.last_advance_ms = now_ms;
        true
    }

    pub fn sample(&mut self, now_ms: u64) -> TimeOfDay {
        self.poll(now_ms);
        self.time
    }
}
