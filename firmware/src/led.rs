use std::time::Duration;

use anyhow::Context;
use esp_idf_hal::{
    gpio::OutputPin,
    peripheral::Peripheral,
    rmt::{
        config::TransmitConfig, PinState, Pulse, RmtChannel, TxRmtDriver, VariableLengthSignal,
    },
};
use log::warn;
use smart_leds::{SmartLedsWrite, RGB8};

// WS2812 bit timings.
const T0H_NS: u64 = 350;
const T0L_NS: u64 = 800;
const T1H_NS: u64 = 700;
const T1L_NS: u64 = 600;

struct BitPulses {
    zero: (Pulse, Pulse),
    one: (Pulse, Pulse),
}

enum LedBackend {
    Rmt {
        tx: TxRmtDriver<'static>,
        pulses: BitPulses,
    },
    Disabled,
}

/// WS2812 chain driven by one RMT channel. Colors go out GRB, MSB first.
pub struct Ws2812 {
    backend: LedBackend,
    failed_writes: u64,
}

impl Ws2812 {
    pub fn new<C, P>(
        channel: impl Peripheral<P = C> + 'static,
        pin: impl Peripheral<P = P> + 'static,
    ) -> anyhow::Result<Self>
    where
        C: RmtChannel,
        P: OutputPin,
    {
        let config = TransmitConfig::new().clock_divider(1);
        let tx =
            TxRmtDriver::new(channel, pin, &config).context("failed to init RMT led driver")?;

        let ticks_hz = tx.counter_clock()?;
        let pulse = |state, ns| Pulse::new_with_duration(ticks_hz, state, &Duration::from_nanos(ns));
        let pulses = BitPulses {
            zero: (pulse(PinState::High, T0H_NS)?, pulse(PinState::Low, T0L_NS)?),
            one: (pulse(PinState::High, T1H_NS)?, pulse(PinState::Low, T1L_NS)?),
        };

        Ok(Self {
            backend: LedBackend::Rmt { tx, pulses },
            failed_writes: 0,
        })
    }

    pub fn disabled() -> Self {
        Self {
            backend: LedBackend::Disabled,
            failed_writes: 0,
        }
    }

    /// Best-effort write; a failed transfer is logged and counted.
    pub fn show(&mut self, pixels: &[RGB8]) {
        if let Err(err) = self.write(pixels.iter().copied()) {
            self.failed_writes = self.failed_writes.saturating_add(1);
            warn!("led write failed ({} so far): {err:#}", self.failed_writes);
        }
    }
}

impl SmartLedsWrite for Ws2812 {
    type Error = anyhow::Error;
    type Color = RGB8;

    fn write<T, I>(&mut self, iterator: T) -> Result<(), Self::Error>
    where
        T: IntoIterator<Item = I>,
        I: Into<Self::Color>,
    {
        let LedBackend::Rmt { tx, pulses } = &mut self.backend else {
            return Ok(());
        };

        let colors: Vec<RGB8> = iterator.into_iter().map(Into::into).collect();
        let mut signal = VariableLengthSignal::with_capacity(colors.len() * 24 * 2);
        for color in &colors {
            let grb = (u32::from(color.g) << 16) | (u32::from(color.r) << 8) | u32::from(color.b);
            for bit in (0..24).rev() {
                let (high, low) = if grb & (1 << bit) != 0 {
                    &pulses.one
                } else {
                    &pulses.zero
                };
                signal
                    .push([high, low])
                    .context("failed to encode led bit")?;
            }
        }

        tx.start_blocking(&signal)
            .context("failed to transmit led frame over RMT")?;
        Ok(())
    }
}
