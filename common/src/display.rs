use std::collections::BTreeMap;

use smart_leds::{brightness, RGB8};

use crate::{clock::DisplayTime, color};

pub const LED_COUNT: usize = 17;

pub const HOUR_SLOTS: [usize; 5] = [0, 1, 2, 3, 4];
pub const MINUTE_SLOTS: [usize; 6] = [10, 9, 8, 7, 6, 5];
pub const SECOND_SLOTS: [usize; 6] = [11, 12, 13, 14, 15, 16];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldColors {
    pub hour: RGB8,
    pub minute: RGB8,
    pub second: RGB8,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayFrame {
    lit: BTreeMap<usize, RGB8>,
}

impl DisplayFrame {
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn set(&mut self, index: usize, color: RGB8) {
        if index < LED_COUNT {
            self.lit.insert(index, color);
        }
    }

    pub fn get(&self, index: usize) -> Option<RGB8> {
        self.lit.get(&index).copied()
    }

    pub fn lit_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.lit.keys().copied()
    }

    pub fn is_blank(&self) -> bool {
        self.lit.is_empty()
    }

    pub fn pixels(&self, level: u8) -> Vec<RGB8> {
        let raw = (0..LED_COUNT).map(|index| self.get(index).unwrap_or(color::BLACK));
        brightness(raw, level).collect()
    }

    pub fn bit_string(&self) -> String {
        let column = |slots: &[usize]| -> String {
            slots
                .iter()
                .rev()
                .map(|index| if self.lit.contains_key(index) { '1' } else { '0' })
                .collect()
        };
        format!(
            "{}|{}|{}",
            column(&HOUR_SLOTS),
            column(&MINUTE_SLOTS),
            column(&SECOND_SLOTS)
        )
    }
}

/// Encodes an already converted display time. The hour is encoded as given;
/// 12-hour conversion happens in [`crate::clock::TimeOfDay::display`].
pub fn encode(time: &DisplayTime, colors: &FieldColors) -> DisplayFrame {
    let mut frame = DisplayFrame::blank();
    encode_field(&mut frame, time.hour, &HOUR_SLOTS, colors.hour);
    encode_field(&mut frame, time.minute, &MINUTE_SLOTS, colors.minute);
    encode_field(&mut frame, time.second, &SECOND_SLOTS, colors.second);
    frame
}

fn encode_field(frame: &mut DisplayFrame, value: u8, slots: &[usize], color: RGB8) {
    for (bit, index) in slots.iter().enumerate() {
        if value & (1 << bit) != 0 {
            frame.set(*index, color);
        }
    }
}
