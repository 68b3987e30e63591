use smart_leds::RGB8;

use crate::color;

pub fn derive_color(connected: bool) -> RGB8 {
    if connected {
        color::STATUS_CONNECTED
    } else {
        color::STATUS_ALERT
    }
}

#[derive(Debug, Clone)]
pub struct StatusIndicator {
    interval_ms: u64,
    last_poll_ms: Option<u64>,
}

impl StatusIndicator {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_poll_ms: None,
        }
    }

    pub fn is_due(&self, now_ms: u64) -> bool {
        self.last_poll_ms
            .map(|last| now_ms.saturating_sub(last) >= self.interval_ms)
            .unwrap_or(true)
    }

    pub fn poll(&mut self, now_ms: u64, connected: bool) -> Option<RGB8> {
        if !self.is_due(now_ms) {
            return None;
        }
        self.last_poll_ms = Some(now_ms);
        Some(derive_color(connected))
    }
}
