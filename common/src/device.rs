use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    animation::{self, ProvisioningAnimation},
    clock::{ManualClock, TimeOfDay, UNAVAILABLE_TEXT},
    config::{ClockConfig, ClockSettings, NetworkCredentials, FIRMWARE_VERSION},
    display::{self, DisplayFrame, FieldColors},
    platform::Platform,
    settings::{ManualTimeError, ManualTimeUpdate, SettingsUpdate, UpdateOutcome},
    status::StatusIndicator,
    store::{self, StoreError},
    types::{ClockStatus, CredentialsAccepted, DeviceMode, JoinResult, NetworkStatus},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRestart {
    pub due_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestartState {
    Idle,
    Scheduled(PendingRestart),
    Committed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenderState {
    Stale,
    Showing(TimeOfDay),
    Unavailable,
}

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("wifi ssid cannot be empty")]
    EmptySsid,
    #[error("a restart is already pending")]
    RestartPending,
    #[error("failed to persist credentials: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct DeviceController {
    config: ClockConfig,
    settings: ClockSettings,
    credentials: NetworkCredentials,
    mode: DeviceMode,
    restart: RestartState,
    manual_clock: ManualClock,
    render: RenderState,
    status: StatusIndicator,
    animation: ProvisioningAnimation,
}

impl DeviceController {
    pub fn boot<P: Platform>(platform: &mut P, config: ClockConfig) -> Self {
        let settings = load_or_create_settings(platform);
        let credentials = store::load_credentials(platform.store());
        info!(
            "booting binclock {FIRMWARE_VERSION}: ssid=`{}`, manual_mode={}",
            credentials.ssid, settings.manual_mode
        );

        for frame in animation::startup_sweep() {
            platform.render_frame(&frame, settings.brightness);
            platform.delay_ms(config.startup_animation_step_ms);
        }

        let now_ms = platform.now_ms();
        let mut controller = Self {
            manual_clock: ManualClock::new(
                settings.manual_time(),
                now_ms,
                config.manual_tick_interval_ms,
            ),
            status: StatusIndicator::new(config.status_poll_interval_ms),
            animation: ProvisioningAnimation::new(config.animation_step_ms),
            config,
            settings,
            credentials,
            mode: DeviceMode::Provisioning,
            restart: RestartState::Idle,
            render: RenderState::Stale,
        };

        if !controller.credentials.is_provisioned() {
            info!("no stored wifi credentials");
            controller.enter_provisioning(platform);
            return controller;
        }

        match controller.join_saved_network(platform) {
            JoinResult::Connected => controller.enter_operating(platform),
            JoinResult::Failed => controller.enter_provisioning(platform),
        }
        controller
    }

    fn join_saved_network<P: Platform>(&mut self, platform: &mut P) -> JoinResult {
        let attempts = self.config.wifi_connect_attempts;
        platform.begin_join(&self.credentials.ssid, &self.credentials.password);
        info!("joining `{}`", self.credentials.ssid);

        let mut attempt = 0;
        while platform.network_status() != NetworkStatus::Connected {
            if attempt >= attempts {
                warn!(
                    "could not join `{}` after {attempts} attempts",
                    self.credentials.ssid
                );
                return JoinResult::Failed;
            }
            platform.delay_ms(self.config.wifi_retry_delay_ms);
            attempt += 1;
        }

        info!("joined `{}` after {attempt} retries", self.credentials.ssid);
        JoinResult::Connected
    }

    fn enter_provisioning<P: Platform>(&mut self, platform: &mut P) {
        self.mode = DeviceMode::Provisioning;
        if let Err(err) = platform.start_access_point(&self.config.access_point_ssid) {
            warn!("failed to start provisioning access point: {err:#}");
        }
        if let Err(err) = platform.start_captive_dns() {
            warn!("failed to start captive dns: {err:#}");
        }
        info!(
            "provisioning mode: access point `{}`",
            self.config.access_point_ssid
        );
    }

    fn enter_operating<P: Platform>(&mut self, platform: &mut P) {
        self.mode = DeviceMode::Operating;

        if let Err(err) = platform.register_mdns(&self.config.mdns_hostname) {
            warn!("mdns registration failed, continuing without it: {err:#}");
        }

        platform.configure_time(&self.settings.timezone_rule);
        let mut attempt = 0;
        while platform.time_now().is_none() {
            if attempt >= self.config.time_sync_attempts {
                warn!("network time not available yet; the display waits for sync");
                break;
            }
            platform.delay_ms(self.config.time_sync_retry_delay_ms);
            attempt += 1;
        }

        self.render = RenderState::Stale;
        info!("operating mode: tz=`{}`", self.settings.timezone_rule);
    }

    pub fn service<P: Platform>(&mut self, platform: &mut P) {
        let now_ms = platform.now_ms();

        if self.mode == DeviceMode::Provisioning {
            platform.service_captive_dns();
            if let Some(frame) = self.animation.step(now_ms) {
                platform.render_frame(&frame, self.settings.brightness);
            }
        } else {
            self.refresh_display(platform, now_ms);
        }

        let connected = self.mode == DeviceMode::Operating
            && platform.network_status() == NetworkStatus::Connected;
        if let Some(color) = self.status.poll(now_ms, connected) {
            platform.set_status_led(color);
        }

        if let RestartState::Scheduled(pending) = self.restart {
            if now_ms >= pending.due_ms {
                info!("scheduled restart is due");
                self.restart = RestartState::Committed;
                platform.restart();
            }
        }
    }

    fn refresh_display<P: Platform>(&mut self, platform: &mut P, now_ms: u64) {
        let sample = if self.settings.manual_mode {
            Some(self.manual_clock.sample(now_ms))
        } else {
            platform.time_now()
        };

        match sample {
            Some(time) => {
                if self.render == RenderState::Showing(time) {
                    return;
                }
                let frame = display::encode(&time.display(self.settings.use_24_hour), &self.colors());
                debug!("render {}", frame.bit_string());
                platform.render_frame(&frame, self.settings.brightness);
                self.render = RenderState::Showing(time);
            }
            None => {
                if self.render != RenderState::Unavailable {
                    platform.render_frame(&DisplayFrame::blank(), self.settings.brightness);
                    self.render = RenderState::Unavailable;
                }
            }
        }
    }

    fn colors(&self) -> FieldColors {
        FieldColors {
            hour: self.settings.hour_color,
            minute: self.settings.minute_color,
            second: self.settings.second_color,
        }
    }

    pub fn mode(&self) -> DeviceMode {
        self.mode
    }

    pub fn pending_restart(&self) -> Option<PendingRestart> {
        match self.restart {
            RestartState::Scheduled(pending) => Some(pending),
            _ => None,
        }
    }

    pub fn is_restart_pending(&self) -> bool {
        self.restart != RestartState::Idle
    }

    pub fn settings(&self) -> ClockSettings {
        let mut snapshot = self.settings.clone();
        let manual = self.manual_clock.time();
        snapshot.manual_hour = manual.hour;
        snapshot.manual_minute = manual.minute;
        snapshot.manual_second = manual.second;
        snapshot
    }

    pub fn current_time<P: Platform>(&self, platform: &P) -> Option<TimeOfDay> {
        if self.settings.manual_mode {
            Some(self.manual_clock.time())
        } else {
            platform.time_now()
        }
    }

    pub fn time_text<P: Platform>(&self, platform: &P) -> String {
        let use_24_hour = self.settings.use_24_hour;
        self.current_time(platform)
            .map(|time| time.display(use_24_hour).text(use_24_hour))
            .unwrap_or_else(|| UNAVAILABLE_TEXT.to_string())
    }

    pub fn status<P: Platform>(&self, platform: &P) -> ClockStatus {
        let now_ms = platform.now_ms();
        let time_available = self.current_time(platform).is_some();
        ClockStatus {
            time: self.time_text(platform),
            time_available,
            mode: self.mode.as_str(),
            version: FIRMWARE_VERSION,
            restart_pending: self.is_restart_pending(),
            restart_in_ms: self
                .pending_restart()
                .map(|pending| pending.due_ms.saturating_sub(now_ms)),
            settings: self.settings(),
        }
    }

    pub fn apply_settings_update<P: Platform>(
        &mut self,
        platform: &mut P,
        update: SettingsUpdate,
    ) -> UpdateOutcome {
        self.settings = self.settings();
        let previous_rule = self.settings.timezone_rule.clone();

        let outcome = self.settings.apply_update(update);
        for field in &outcome.rejected {
            warn!("ignoring invalid settings field `{field}`");
        }
        if !outcome.changed() {
            return outcome;
        }

        if ["manualHour", "manualMinute", "manualSecond"]
            .iter()
            .any(|field| outcome.touched(field))
        {
            self.manual_clock
                .set(self.settings.manual_time(), platform.now_ms());
        }

        if self.settings.timezone_rule != previous_rule && self.mode == DeviceMode::Operating {
            platform.configure_time(&self.settings.timezone_rule);
        }

        self.render = RenderState::Stale;
        self.persist_settings(platform);
        info!("settings updated: {:?}", outcome.applied);
        outcome
    }

    pub fn set_manual_time<P: Platform>(
        &mut self,
        platform: &mut P,
        update: ManualTimeUpdate,
    ) -> Result<TimeOfDay, ManualTimeError> {
        let time = update.validate()?;
        self.manual_clock.set(time, platform.now_ms());
        self.settings = self.settings();
        self.render = RenderState::Stale;
        self.persist_settings(platform);
        info!(
            "manual time set to {:02}:{:02}:{:02}",
            time.hour, time.minute, time.second
        );
        Ok(time)
    }

    pub fn update_credentials<P: Platform>(
        &mut self,
        platform: &mut P,
        credentials: NetworkCredentials,
    ) -> Result<CredentialsAccepted, CredentialsError> {
        if self.is_restart_pending() {
            return Err(CredentialsError::RestartPending);
        }
        let credentials = NetworkCredentials::new(credentials.ssid.trim(), credentials.password);
        if !credentials.is_provisioned() {
            return Err(CredentialsError::EmptySsid);
        }

        store::save_credentials(platform.store(), &credentials)?;

        let delay_ms = self.config.credential_restart_delay_ms;
        let pending = PendingRestart {
            due_ms: platform.now_ms().saturating_add(delay_ms),
        };
        self.restart = RestartState::Scheduled(pending);
        info!(
            "stored credentials for `{}`; restarting in {delay_ms}ms",
            credentials.ssid
        );
        let ssid = credentials.ssid.clone();
        self.credentials = credentials;

        Ok(CredentialsAccepted {
            ssid,
            restart_in_ms: delay_ms,
        })
    }

    /// Erases stored credentials. Returns the delay the caller waits (after
    /// acknowledging the request) before restarting the device.
    pub fn factory_reset<P: Platform>(&mut self, platform: &mut P) -> Result<u64, CredentialsError> {
        if self.is_restart_pending() {
            return Err(CredentialsError::RestartPending);
        }
        store::erase_credentials(platform.store())?;
        self.credentials = NetworkCredentials::default();
        self.restart = RestartState::Committed;
        warn!("factory reset: wifi credentials erased");
        Ok(self.config.factory_reset_delay_ms)
    }

    fn persist_settings<P: Platform>(&mut self, platform: &mut P) {
        if let Err(err) = store::save_settings(platform.store(), &self.settings) {
            warn!("failed to persist settings: {err}");
        }
    }
}

fn load_or_create_settings<P: Platform>(platform: &mut P) -> ClockSettings {
    match store::load_settings(platform.store()) {
        Ok(loaded) if loaded.first_boot => {
            info!("no stored settings; writing defaults");
            if let Err(err) = store::save_settings(platform.store(), &loaded.settings) {
                warn!("failed to persist default settings: {err}");
            }
            loaded.settings
        }
        Ok(loaded) => loaded.settings,
        Err(err) => {
            warn!("stored settings unreadable, using defaults: {err}");
            ClockSettings::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use smart_leds::RGB8;

    use super::*;
    use crate::{
        color,
        display::LED_COUNT,
        store::{KeyValueStore, MemoryStore, KEY_SETTINGS},
        testing::MockPlatform,
    };

    fn provisioned(connect_after_polls: Option<u32>) -> MockPlatform {
        let mut store = MemoryStore::new();
        store::save_credentials(&mut store, &NetworkCredentials::new("home", "pw")).unwrap();
        let mut platform = MockPlatform::with_store(store);
        platform.connect_after_polls = connect_after_polls;
        platform
    }

    fn time(hour: u8, minute: u8, second: u8) -> TimeOfDay {
        TimeOfDay::new(hour, minute, second).unwrap()
    }

    fn settings_update(json: &str) -> SettingsUpdate {
        SettingsUpdate::from_json(json.as_bytes()).unwrap()
    }

    #[test]
    fn empty_ssid_boots_into_provisioning() {
        let mut platform = MockPlatform::new();
        let controller = DeviceController::boot(&mut platform, ClockConfig::default());

        assert_eq!(controller.mode(), DeviceMode::Provisioning);
        assert!(platform.joins.is_empty());
        assert_eq!(platform.access_point.as_deref(), Some("BinaryClock-Setup"));
        assert!(platform.captive_dns_started);
    }

    #[test]
    fn join_failure_after_all_attempts_falls_back_to_provisioning() {
        let mut platform = provisioned(None);
        let controller = DeviceController::boot(&mut platform, ClockConfig::default());

        assert_eq!(controller.mode(), DeviceMode::Provisioning);
        assert_eq!(platform.joins, vec![("home".to_string(), "pw".to_string())]);
        let join_delays = platform.delays.iter().filter(|ms| **ms == 500).count();
        assert_eq!(join_delays, 20);
        assert!(platform.access_point.is_some());
    }

    #[test]
    fn join_success_enters_operating_and_syncs_time() {
        let mut platform = provisioned(Some(3));
        platform.wall_clock = Some(time(8, 30, 0));
        let controller = DeviceController::boot(&mut platform, ClockConfig::default());

        assert_eq!(controller.mode(), DeviceMode::Operating);
        assert!(platform.access_point.is_none());
        assert_eq!(platform.mdns_hostname.as_deref(), Some("binaryclock"));
        assert_eq!(
            platform.timezone_rules,
            vec![crate::config::DEFAULT_TIMEZONE_RULE.to_string()]
        );
    }

    #[test]
    fn mdns_and_time_sync_failures_do_not_block_operating() {
        let mut platform = provisioned(Some(0));
        platform.mdns_fails = true;
        let mut controller = DeviceController::boot(&mut platform, ClockConfig::default());

        assert_eq!(controller.mode(), DeviceMode::Operating);
        assert_eq!(controller.time_text(&platform), UNAVAILABLE_TEXT);

        platform.frames.clear();
        controller.service(&mut platform);
        assert_eq!(platform.last_frame(), Some(&DisplayFrame::blank()));

        platform.advance(10);
        controller.service(&mut platform);
        assert_eq!(platform.frames.len(), 1, "unavailable frame is drawn once");
    }

    #[test]
    fn time_stays_unavailable_until_network_time_arrives() {
        let mut platform = provisioned(Some(0));
        platform.wall_clock = Some(time(1, 2, 3));
        platform.time_available_from_ms = 60_000;
        let mut controller = DeviceController::boot(&mut platform, ClockConfig::default());

        assert_eq!(controller.mode(), DeviceMode::Operating);
        let sync_waits = platform.delays.iter().filter(|ms| **ms == 500).count();
        assert_eq!(sync_waits, 10);

        platform.frames.clear();
        controller.service(&mut platform);
        assert_eq!(controller.time_text(&platform), UNAVAILABLE_TEXT);
        assert!(platform.last_frame().unwrap().is_blank());

        platform.now_ms = 60_000;
        controller.service(&mut platform);
        assert_eq!(controller.time_text(&platform), "01:02:03");
        assert_eq!(platform.last_frame().unwrap().bit_string(), "00001|000010|000011");
        assert_eq!(platform.frames.len(), 2);
    }

    #[test]
    fn first_boot_persists_default_settings() {
        let mut platform = MockPlatform::new();
        DeviceController::boot(&mut platform, ClockConfig::default());

        let loaded = store::load_settings(&platform.store).unwrap();
        assert!(!loaded.first_boot);
        assert_eq!(loaded.settings, ClockSettings::default());
    }

    #[test]
    fn corrupt_settings_fall_back_to_defaults() {
        let mut store = MemoryStore::new();
        store.set_str(KEY_SETTINGS, "garbage").unwrap();
        let mut platform = MockPlatform::with_store(store);

        let controller = DeviceController::boot(&mut platform, ClockConfig::default());
        assert_eq!(controller.settings(), ClockSettings::default());
    }

    #[test]
    fn boot_plays_the_startup_sweep() {
        let mut platform = MockPlatform::new();
        DeviceController::boot(&mut platform, ClockConfig::default());

        assert_eq!(platform.frames.len(), LED_COUNT + 1);
        assert!(platform.last_frame().unwrap().is_blank());
    }

    #[test]
    fn redraws_only_when_the_second_changes() {
        let mut platform = provisioned(Some(0));
        platform.wall_clock = Some(time(13, 5, 7));
        let mut controller = DeviceController::boot(&mut platform, ClockConfig::default());
        platform.frames.clear();

        controller.service(&mut platform);
        controller.service(&mut platform);
        assert_eq!(platform.frames.len(), 1);
        assert_eq!(platform.last_frame().unwrap().bit_string(), "01101|000101|000111");

        platform.wall_clock = Some(time(13, 5, 8));
        controller.service(&mut platform);
        assert_eq!(platform.frames.len(), 2);
        assert_eq!(platform.last_frame().unwrap().bit_string(), "01101|000101|001000");
    }

    #[test]
    fn twelve_hour_mode_encodes_converted_hour() {
        let mut platform = provisioned(Some(0));
        platform.wall_clock = Some(time(0, 0, 1));
        let mut controller = DeviceController::boot(&mut platform, ClockConfig::default());

        controller.apply_settings_update(&mut platform, settings_update(r#"{"use24Hour":false}"#));
        controller.service(&mut platform);

        assert_eq!(platform.last_frame().unwrap().bit_string(), "01100|000000|000001");
        assert_eq!(controller.time_text(&platform), "12:00:01 AM");
    }

    #[test]
    fn manual_mode_ticks_the_software_clock() {
        let mut platform = provisioned(Some(0));
        let mut controller = DeviceController::boot(&mut platform, ClockConfig::default());
        controller.apply_settings_update(&mut platform, settings_update(r#"{"manualMode":true}"#));
        controller
            .set_manual_time(
                &mut platform,
                ManualTimeUpdate {
                    hour: 23,
                    minute: 59,
                    second: 59,
                },
            )
            .unwrap();

        controller.service(&mut platform);
        assert_eq!(controller.time_text(&platform), "23:59:59");

        platform.advance(1_000);
        controller.service(&mut platform);
        assert_eq!(controller.time_text(&platform), "00:00:00");
        assert!(platform.last_frame().unwrap().is_blank());
        assert_eq!(controller.settings().manual_hour, 0);
    }

    #[test]
    fn manual_time_is_rejected_when_out_of_range() {
        let mut platform = MockPlatform::new();
        let mut controller = DeviceController::boot(&mut platform, ClockConfig::default());

        let result = controller.set_manual_time(
            &mut platform,
            ManualTimeUpdate {
                hour: 12,
                minute: 61,
                second: 0,
            },
        );
        assert!(result.is_err());
        assert_eq!(controller.settings().manual_minute, 0);
    }

    #[test]
    fn settings_update_persists_valid_fields_and_skips_bad_ones() {
        let mut platform = MockPlatform::new();
        let mut controller = DeviceController::boot(&mut platform, ClockConfig::default());

        let outcome = controller.apply_settings_update(
            &mut platform,
            settings_update(r##"{"brightness":"x","hourColor":"#010203"}"##),
        );

        assert_eq!(outcome.rejected, vec!["brightness"]);
        let stored = store::load_settings(&platform.store).unwrap().settings;
        assert_eq!(stored.brightness, ClockSettings::default().brightness);
        assert_eq!(stored.hour_color, RGB8 { r: 1, g: 2, b: 3 });
    }

    #[test]
    fn timezone_change_reconfigures_time_in_operating_mode() {
        let mut platform = provisioned(Some(0));
        let mut controller = DeviceController::boot(&mut platform, ClockConfig::default());

        controller.apply_settings_update(
            &mut platform,
            settings_update(r#"{"timezoneRule":"UTC0"}"#),
        );

        assert_eq!(platform.timezone_rules.last().map(String::as_str), Some("UTC0"));
    }

    #[test]
    fn credential_update_arms_restart_after_delay() {
        let mut platform = MockPlatform::new();
        let mut controller = DeviceController::boot(&mut platform, ClockConfig::default());
        let requested_at = platform.now_ms;

        let accepted = controller
            .update_credentials(&mut platform, NetworkCredentials::new(" office ", "pw2"))
            .unwrap();

        assert_eq!(accepted.ssid, "office");
        let pending = controller.pending_restart().unwrap();
        assert!(pending.due_ms >= requested_at + 8_000);
        assert_eq!(
            store::load_credentials(&platform.store),
            NetworkCredentials::new("office", "pw2")
        );

        platform.now_ms = pending.due_ms - 1;
        controller.service(&mut platform);
        assert_eq!(platform.restarts, 0);

        platform.now_ms = pending.due_ms;
        controller.service(&mut platform);
        assert_eq!(platform.restarts, 1);

        platform.advance(5_000);
        controller.service(&mut platform);
        assert_eq!(platform.restarts, 1, "restart fires once");
    }

    #[test]
    fn no_further_transitions_while_restart_is_pending() {
        let mut platform = MockPlatform::new();
        let mut controller = DeviceController::boot(&mut platform, ClockConfig::default());
        controller
            .update_credentials(&mut platform, NetworkCredentials::new("a", ""))
            .unwrap();

        assert!(matches!(
            controller.update_credentials(&mut platform, NetworkCredentials::new("b", "")),
            Err(CredentialsError::RestartPending)
        ));
        assert!(matches!(
            controller.factory_reset(&mut platform),
            Err(CredentialsError::RestartPending)
        ));
        assert_eq!(store::load_credentials(&platform.store).ssid, "a");
    }

    #[test]
    fn empty_ssid_update_is_rejected_without_restart() {
        let mut platform = MockPlatform::new();
        let mut controller = DeviceController::boot(&mut platform, ClockConfig::default());

        let result = controller.update_credentials(&mut platform, NetworkCredentials::new("  ", "x"));

        assert!(matches!(result, Err(CredentialsError::EmptySsid)));
        assert!(!controller.is_restart_pending());
    }

    #[test]
    fn failed_credential_write_does_not_arm_restart() {
        let mut platform = MockPlatform::new();
        let mut controller = DeviceController::boot(&mut platform, ClockConfig::default());
        platform.store.fail_writes = true;

        let result = controller.update_credentials(&mut platform, NetworkCredentials::new("a", ""));

        assert!(matches!(result, Err(CredentialsError::Store(_))));
        assert!(!controller.is_restart_pending());
    }

    #[test]
    fn factory_reset_erases_credentials() {
        let mut platform = provisioned(Some(0));
        let mut controller = DeviceController::boot(&mut platform, ClockConfig::default());

        let delay = controller.factory_reset(&mut platform).unwrap();

        assert_eq!(delay, 1_000);
        assert!(!store::load_credentials(&platform.store).is_provisioned());
        assert!(controller.is_restart_pending());
        assert!(controller.pending_restart().is_none());
    }

    #[test]
    fn status_led_follows_connectivity_on_its_interval() {
        let mut platform = provisioned(Some(0));
        platform.wall_clock = Some(time(1, 2, 3));
        let mut controller = DeviceController::boot(&mut platform, ClockConfig::default());

        controller.service(&mut platform);
        assert_eq!(platform.status_colors, vec![color::STATUS_CONNECTED]);

        platform.link_lost = true;
        platform.advance(1_000);
        controller.service(&mut platform);
        assert_eq!(platform.status_colors.len(), 1);

        platform.advance(1_000);
        controller.service(&mut platform);
        assert_eq!(platform.status_colors.last(), Some(&color::STATUS_ALERT));
    }

    #[test]
    fn provisioning_loop_services_dns_and_animation_and_shows_alert() {
        let mut platform = MockPlatform::new();
        let mut controller = DeviceController::boot(&mut platform, ClockConfig::default());
        platform.frames.clear();

        controller.service(&mut platform);
        platform.advance(120);
        controller.service(&mut platform);

        assert_eq!(platform.captive_dns_serviced, 2);
        assert_eq!(platform.frames.len(), 2);
        assert_eq!(platform.status_colors, vec![color::STATUS_ALERT]);
    }

    #[test]
    fn status_snapshot_reports_mode_and_pending_restart() {
        let mut platform = MockPlatform::new();
        let mut controller = DeviceController::boot(&mut platform, ClockConfig::default());
        controller
            .update_credentials(&mut platform, NetworkCredentials::new("home", "pw"))
            .unwrap();
        platform.advance(3_000);

        let status = controller.status(&platform);

        assert_eq!(status.mode, "PROVISIONING");
        assert!(status.restart_pending);
        assert_eq!(status.restart_in_ms, Some(5_000));
        assert_eq!(status.version, FIRMWARE_VERSION);
        assert_eq!(status.time, UNAVAILABLE_TEXT);
    }

    #[test]
    fn provisioning_then_credentials_then_reboot_reaches_operating() {
        let mut platform = MockPlatform::new();
        platform.connect_after_polls = Some(2);
        platform.wall_clock = Some(time(6, 7, 8));

        let mut controller = DeviceController::boot(&mut platform, ClockConfig::default());
        assert_eq!(controller.mode(), DeviceMode::Provisioning);

        controller
            .update_credentials(&mut platform, NetworkCredentials::new("home", "pw"))
            .unwrap();
        platform.advance(8_000);
        controller.service(&mut platform);
        assert_eq!(platform.restarts, 1);

        let mut controller = DeviceController::boot(&mut platform, ClockConfig::default());
        assert_eq!(controller.mode(), DeviceMode::Operating);
        assert_eq!(platform.timezone_rules.len(), 1);

        controller.service(&mut platform);
        assert_eq!(platform.last_frame().unwrap().bit_string(), "00110|000111|001000");
        assert_eq!(controller.time_text(&platform), "06:07:08");
    }
}
