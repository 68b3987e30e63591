use smart_leds::RGB8;

use crate::{
    clock::TimeOfDay,
    display::DisplayFrame,
    store::KeyValueStore,
    types::NetworkStatus,
};

pub trait Platform {
    type Store: KeyValueStore;

    fn store(&mut self) -> &mut Self::Store;

    fn now_ms(&self) -> u64;

    fn delay_ms(&mut self, ms: u64);

    /// Starts associating with `ssid`; progress is observed via `network_status`.
    fn begin_join(&mut self, ssid: &str, password: &str);

    fn network_status(&self) -> NetworkStatus;

    fn start_access_point(&mut self, ssid: &str) -> anyhow::Result<()>;

    fn start_captive_dns(&mut self) -> anyhow::Result<()>;

    fn service_captive_dns(&mut self);

    fn register_mdns(&mut self, hostname: &str) -> anyhow::Result<()>;

    fn configure_time(&mut self, timezone_rule: &str);

    /// Local wall-clock time, `None` until network time has been obtained.
    fn time_now(&self) -> Option<TimeOfDay>;

    fn render_frame(&mut self, frame: &DisplayFrame, brightness: u8);

    fn set_status_led(&mut self, color: RGB8);

    fn restart(&mut self);
}
