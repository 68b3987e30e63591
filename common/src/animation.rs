use smart_leds::RGB8;

use crate::{
    color,
    display::{DisplayFrame, LED_COUNT},
};

const TAIL_LENGTH: usize = 3;

#[derive(Debug, Clone)]
pub struct ProvisioningAnimation {
    head: usize,
    last_step_ms: Option<u64>,
    step_ms: u64,
}

impl ProvisioningAnimation {
    pub fn new(step_ms: u64) -> Self {
        Self {
            head: 0,
            last_step_ms: None,
            step_ms,
        }
    }

    pub fn step(&mut self, now_ms: u64) -> Option<DisplayFrame> {
        if let Some(last) = self.last_step_ms {
            if now_ms.saturating_sub(last) < self.step_ms {
                return None;
            }
            self.head = (self.head + 1) % LED_COUNT;
        }
        self.last_step_ms = Some(now_ms);
        Some(chase_frame(self.head))
    }
}

fn chase_frame(head: usize) -> DisplayFrame {
    let mut frame = DisplayFrame::blank();
    for offset in 0..TAIL_LENGTH {
        let index = (head + LED_COUNT - offset) % LED_COUNT;
        frame.set(index, fade(color::PROVISIONING_CHASE, offset));
    }
    frame
}

fn fade(base: RGB8, steps: usize) -> RGB8 {
    let shift = (steps * 2) as u32;
    RGB8 {
        r: base.r >> shift,
        g: base.g >> shift,
        b: base.b >> shift,
    }
}

pub fn startup_sweep() -> impl Iterator<Item = DisplayFrame> {
    (0..LED_COUNT)
        .map(|index| {
            let mut frame = DisplayFrame::blank();
            frame.set(index, color::STARTUP_SWEEP);
            frame
        })
        .chain(std::iter::once(DisplayFrame::blank()))
}
