use std::cell::Cell;

use smart_leds::RGB8;

use crate::{
    clock::TimeOfDay, display::DisplayFrame, platform::Platform, store::MemoryStore,
    types::NetworkStatus,
};

#[derive(Debug, Default)]
pub struct MockPlatform {
    pub store: MemoryStore,
    pub now_ms: u64,
    pub delays: Vec<u64>,

    pub joins: Vec<(String, String)>,
    /// Status polls after `begin_join` before the link reports up; `None` never connects.
    pub connect_after_polls: Option<u32>,
    status_polls: Cell<u32>,
    pub link_lost: bool,

    pub access_point: Option<String>,
    pub captive_dns_started: bool,
    pub captive_dns_serviced: u32,
    pub mdns_fails: bool,
    pub mdns_hostname: Option<String>,

    pub timezone_rules: Vec<String>,
    pub wall_clock: Option<TimeOfDay>,
    pub time_available_from_ms: u64,

    pub frames: Vec<(DisplayFrame, u8)>,
    pub status_colors: Vec<RGB8>,
    pub restarts: u32,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_store(store: MemoryStore) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    pub fn last_frame(&self) -> Option<&DisplayFrame> {
        self.frames.last().map(|(frame, _)| frame)
    }

    pub fn advance(&mut self, ms: u64) {
        self.now_ms += ms;
    }
}

impl Platform for MockPlatform {
    type Store = MemoryStore;

    fn store(&mut self) -> &mut Self::Store {
        &mut self.store
    }

    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn delay_ms(&mut self, ms: u64) {
        self.delays.push(ms);
        self.now_ms += ms;
    }

    fn begin_join(&mut self, ssid: &str, password: &str) {
        self.joins.push((ssid.to_string(), password.to_string()));
        self.status_polls.set(0);
    }

    fn network_status(&self) -> NetworkStatus {
        if self.joins.is_empty() || self.link_lost {
            return NetworkStatus::Disconnected;
        }
        let polls = self.status_polls.get();
        self.status_polls.set(polls.saturating_add(1));
        match self.connect_after_polls {
            Some(needed) if polls >= needed => NetworkStatus::Connected,
            _ => NetworkStatus::Disconnected,
        }
    }

    fn start_access_point(&mut self, ssid: &str) -> anyhow::Result<()> {
        self.access_point = Some(ssid.to_string());
        Ok(())
    }

    fn start_captive_dns(&mut self) -> anyhow::Result<()> {
        self.captive_dns_started = true;
        Ok(())
    }

    fn service_captive_dns(&mut self) {
        self.captive_dns_serviced += 1;
    }

    fn register_mdns(&mut self, hostname: &str) -> anyhow::Result<()> {
        if self.mdns_fails {
            anyhow::bail!("mdns responder unavailable");
        }
        self.mdns_hostname = Some(hostname.to_string());
        Ok(())
    }

    fn configure_time(&mut self, timezone_rule: &str) {
        self.timezone_rules.push(timezone_rule.to_string());
    }

    fn time_now(&self) -> Option<TimeOfDay> {
        if self.now_ms < self.time_available_from_ms {
            return None;
        }
        self.wall_clock
    }

    fn render_frame(&mut self, frame: &DisplayFrame, brightness: u8) {
        self.frames.push((frame.clone(), brightness));
    }

    fn set_status_led(&mut self, color: RGB8) {
        self.status_colors.push(color);
    }

    fn restart(&mut self) {
        self.restarts += 1;
    }
}
