use core::convert::TryInto;
use std::{
    io::ErrorKind,
    net::{SocketAddr, UdpSocket},
    sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError},
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context};
use embedded_svc::{
    http::{Headers, Method},
    io::{Read, Write},
    wifi::{AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration},
};
use esp_idf_hal::{gpio::AnyOutputPin, peripheral::Peripheral, rmt::RmtChannel};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::prelude::Peripherals,
    http::server::{Configuration as HttpConfiguration, EspHttpConnection, EspHttpServer, Request},
    log::EspLogger,
    mdns::EspMdns,
    nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault},
    sntp::EspSntp,
    sys::{self, EspError},
    wifi::EspWifi,
};
use log::{info, warn};
use smart_leds::RGB8;

use binclock_common::{
    api::{self, ApiReply, CAPTIVE_PROBE_PATHS, MAX_BODY_BYTES},
    dns, store, ClockConfig, DeviceController, DeviceMode, DisplayFrame, KeyValueStore,
    NetworkCredentials, NetworkStatus, Platform, StoreError, TimeOfDay,
};

use crate::led::Ws2812;

const NVS_NAMESPACE: &str = "binclock";
const NVS_VALUE_CAPACITY: usize = 1024;
const LED_STRIP_PIN: i32 = 5;
const STATUS_LED_PIN: i32 = 8;
const DNS_PORT: u16 = 53;
const SERVICE_INTERVAL_MS: u64 = 10;
const MDNS_INSTANCE_NAME: &str = "Binary Clock";
/// Anything earlier means SNTP has not set the clock yet (2023-01-01T00:00:00Z).
const MIN_SYNCED_EPOCH: i64 = 1_672_531_200;

const SETUP_HTML: &str = include_str!("../web/setup.html");
const INDEX_HTML: &str = include_str!("../web/index.html");

struct NvsStore {
    nvs: EspNvs<NvsDefault>,
}

impl NvsStore {
    fn open(partition: EspDefaultNvsPartition) -> anyhow::Result<Self> {
        let nvs = EspNvs::new(partition, NVS_NAMESPACE, true)
            .context("failed to open NVS namespace")?;
        Ok(Self { nvs })
    }
}

fn backend_error(err: EspError) -> StoreError {
    StoreError::Backend(err.to_string())
}

impl KeyValueStore for NvsStore {
    fn get_str(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut buffer = vec![0_u8; NVS_VALUE_CAPACITY];
        self.nvs
            .get_str(key, &mut buffer)
            .map(|value| value.map(str::to_string))
            .map_err(backend_error)
    }

    fn set_str(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.nvs.set_str(key, value).map_err(backend_error)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.nvs.remove(key).map(|_| ()).map_err(backend_error)
    }
}

struct EspPlatform {
    store: NvsStore,
    wifi: EspWifi<'static>,
    strip: Ws2812,
    status_led: Ws2812,
    dns_socket: Option<UdpSocket>,
    ap_addr: [u8; 4],
    mdns: Option<EspMdns>,
    sntp: Option<EspSntp<'static>>,
}

impl Platform for EspPlatform {
    type Store = NvsStore;

    fn store(&mut self) -> &mut Self::Store {
        &mut self.store
    }

    fn now_ms(&self) -> u64 {
        monotonic_ms()
    }

    fn delay_ms(&mut self, ms: u64) {
        thread::sleep(Duration::from_millis(ms));
    }

    fn begin_join(&mut self, ssid: &str, password: &str) {
        if let Err(err) = self.start_station(ssid, password) {
            warn!("wifi station start failed: {err:#}");
        }
    }

    fn network_status(&self) -> NetworkStatus {
        let connected = self.wifi.is_connected().unwrap_or(false)
            && self.wifi.sta_netif().is_up().unwrap_or(false);
        if connected {
            NetworkStatus::Connected
        } else {
            NetworkStatus::Disconnected
        }
    }

    fn start_access_point(&mut self, ssid: &str) -> anyhow::Result<()> {
        let _ = self.wifi.disconnect();
        let _ = self.wifi.stop();

        self.wifi
            .set_configuration(&Configuration::AccessPoint(AccessPointConfiguration {
                ssid: ssid
                    .try_into()
                    .map_err(|_| anyhow!("access point ssid too long"))?,
                auth_method: AuthMethod::None,
                channel: 1,
                ..Default::default()
            }))
            .context("failed to configure access point")?;
        self.wifi.start().context("failed to start access point")?;

        self.ap_addr = self
            .wifi
            .ap_netif()
            .get_ip_info()
            .context("failed to read access point address")?
            .ip
            .octets();
        info!(
            "access point `{ssid}` up at {}.{}.{}.{}",
            self.ap_addr[0], self.ap_addr[1], self.ap_addr[2], self.ap_addr[3]
        );
        Ok(())
    }

    fn start_captive_dns(&mut self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], DNS_PORT));
        let socket = UdpSocket::bind(addr).context("failed to bind captive dns socket")?;
        socket
            .set_nonblocking(true)
            .context("failed to make captive dns socket non-blocking")?;
        self.dns_socket = Some(socket);
        info!("captive dns answering on port {DNS_PORT}");
        Ok(())
    }

    fn service_captive_dns(&mut self) {
        let Some(socket) = &self.dns_socket else {
            return;
        };
        let mut buf = [0_u8; 512];
        let (len, peer) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(err) if err.kind() == ErrorKind::WouldBlock => return,
            Err(err) => {
                warn!("captive dns receive failed: {err}");
                return;
            }
        };
        if let Some(response) = dns::captive_response(&buf[..len], self.ap_addr) {
            if let Err(err) = socket.send_to(&response, peer) {
                warn!("captive dns reply failed: {err}");
            }
        }
    }

    fn register_mdns(&mut self, hostname: &str) -> anyhow::Result<()> {
        let mut mdns = EspMdns::take().context("mdns responder unavailable")?;
        mdns.set_hostname(hostname)?;
        mdns.set_instance_name(MDNS_INSTANCE_NAME)?;
        mdns.add_service(None, "_http", "_tcp", 80, &[])?;
        info!("mdns: advertising {hostname}.local");
        self.mdns = Some(mdns);
        Ok(())
    }

    fn configure_time(&mut self, timezone_rule: &str) {
        // Only reached with the runtime lock held; nothing else touches the environment.
        std::env::set_var("TZ", timezone_rule);
        unsafe { sys::tzset() };

        if self.sntp.is_none() {
            match EspSntp::new_default() {
                Ok(sntp) => {
                    info!("SNTP initialized");
                    self.sntp = Some(sntp);
                }
                Err(err) => warn!("failed to start SNTP: {err}"),
            }
        }
    }

    fn time_now(&self) -> Option<TimeOfDay> {
        local_time_of_day()
    }

    fn render_frame(&mut self, frame: &DisplayFrame, brightness: u8) {
        self.strip.show(&frame.pixels(brightness));
    }

    fn set_status_led(&mut self, color: RGB8) {
        self.status_led.show(&[color]);
    }

    fn restart(&mut self) {
        info!("restarting");
        unsafe { sys::esp_restart() };
    }
}

impl EspPlatform {
    fn start_station(&mut self, ssid: &str, password: &str) -> anyhow::Result<()> {
        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPAWPA2Personal
        };

        self.wifi
            .set_configuration(&Configuration::Client(ClientConfiguration {
                ssid: ssid.try_into().map_err(|_| anyhow!("wifi ssid too long"))?,
                password: password
                    .try_into()
                    .map_err(|_| anyhow!("wifi password too long"))?,
                auth_method,
                ..Default::default()
            }))
            .context("failed to configure station")?;
        self.wifi.start().context("failed to start wifi")?;
        self.wifi.connect().context("failed to begin association")?;
        disable_wifi_power_save();
        Ok(())
    }
}

struct Runtime {
    controller: DeviceController,
    platform: EspPlatform,
}

type SharedRuntime = Arc<Mutex<Runtime>>;

fn lock_runtime(runtime: &SharedRuntime) -> MutexGuard<'_, Runtime> {
    runtime.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let mut store = NvsStore::open(nvs_partition.clone())?;
    seed_build_credentials(&mut store);

    let Peripherals { modem, rmt, .. } = Peripherals::take()?;
    let strip = init_led(rmt.channel0, LED_STRIP_PIN, "display strip");
    let status_led = init_led(rmt.channel1, STATUS_LED_PIN, "status led");

    let wifi = EspWifi::new(modem, sys_loop, Some(nvs_partition)).context("wifi init failed")?;

    let mut platform = EspPlatform {
        store,
        wifi,
        strip,
        status_led,
        dns_socket: None,
        ap_addr: [192, 168, 71, 1],
        mdns: None,
        sntp: None,
    };
    let controller = DeviceController::boot(&mut platform, ClockConfig::default());
    let runtime: SharedRuntime = Arc::new(Mutex::new(Runtime {
        controller,
        platform,
    }));

    // Kept alive for the program lifetime.
    let _server = create_http_server(runtime.clone())?;

    loop {
        {
            let mut guard = lock_runtime(&runtime);
            let Runtime {
                controller,
                platform,
            } = &mut *guard;
            controller.service(platform);
        }
        thread::sleep(Duration::from_millis(SERVICE_INTERVAL_MS));
    }
}

/// Build-time `WIFI_SSID`/`WIFI_PASS` seed the store only when nothing is stored yet.
fn seed_build_credentials(store: &mut NvsStore) {
    let Some(ssid) = option_env!("WIFI_SSID") else {
        return;
    };
    let credentials = NetworkCredentials::new(ssid, option_env!("WIFI_PASS").unwrap_or_default());
    if !credentials.is_provisioned() || store::load_credentials(store).is_provisioned() {
        return;
    }
    match store::save_credentials(store, &credentials) {
        Ok(()) => info!("seeded wifi credentials for `{ssid}` from build environment"),
        Err(err) => warn!("failed to seed wifi credentials: {err}"),
    }
}

fn init_led<C: RmtChannel>(
    channel: impl Peripheral<P = C> + 'static,
    pin: i32,
    what: &str,
) -> Ws2812 {
    match Ws2812::new(channel, unsafe { AnyOutputPin::new(pin) }) {
        Ok(led) => {
            info!("{what} initialized on GPIO{pin}");
            led
        }
        Err(err) => {
            warn!("failed to initialize {what} on GPIO{pin}, running disabled: {err:#}");
            Ws2812::disabled()
        }
    }
}

fn create_http_server(runtime: SharedRuntime) -> anyhow::Result<EspHttpServer<'static>> {
    let conf = HttpConfiguration {
        stack_size: 16 * 1024,
        ..Default::default()
    };
    let mut server = EspHttpServer::new(&conf)?;

    for path in CAPTIVE_PROBE_PATHS {
        let runtime = runtime.clone();
        server.fn_handler::<anyhow::Error, _>(path, Method::Get, move |req| {
            let mode = lock_runtime(&runtime).controller.mode();
            let page = match mode {
                DeviceMode::Provisioning => SETUP_HTML,
                DeviceMode::Operating if path == "/" => INDEX_HTML,
                DeviceMode::Operating => {
                    req.into_status_response(204)?;
                    return Ok(());
                }
            };
            req.into_response(200, Some("OK"), &[("Content-Type", "text/html; charset=utf-8")])?
                .write_all(page.as_bytes())?;
            Ok(())
        })?;
    }

    {
        let runtime = runtime.clone();
        server.fn_handler::<anyhow::Error, _>("/api/status", Method::Get, move |req| {
            let reply = {
                let guard = lock_runtime(&runtime);
                api::get_status(&guard.controller, &guard.platform)
            };
            write_reply(req, &reply)
        })?;
    }

    {
        let runtime = runtime.clone();
        server.fn_handler::<anyhow::Error, _>("/api/settings", Method::Get, move |req| {
            let reply = api::get_settings(&lock_runtime(&runtime).controller);
            write_reply(req, &reply)
        })?;
    }

    {
        let runtime = runtime.clone();
        server.fn_handler::<anyhow::Error, _>("/api/settings", Method::Post, move |req| {
            handle_post(&runtime, req, api::post_settings)
        })?;
    }

    {
        let runtime = runtime.clone();
        server.fn_handler::<anyhow::Error, _>("/api/time", Method::Post, move |req| {
            handle_post(&runtime, req, api::post_time)
        })?;
    }

    {
        let runtime = runtime.clone();
        server.fn_handler::<anyhow::Error, _>("/api/wifi", Method::Post, move |req| {
            handle_post(&runtime, req, api::post_wifi)
        })?;
    }

    server.fn_handler::<anyhow::Error, _>("/api/reset", Method::Post, move |req| {
        let (reply, restart_in_ms) = {
            let mut guard = lock_runtime(&runtime);
            let Runtime {
                controller,
                platform,
            } = &mut *guard;
            api::post_reset(controller, platform)
        };
        write_reply(req, &reply)?;

        if let Some(delay_ms) = restart_in_ms {
            thread::Builder::new()
                .name("factory-reset".into())
                .spawn(move || {
                    thread::sleep(Duration::from_millis(delay_ms));
                    unsafe { sys::esp_restart() };
                })
                .context("failed to spawn restart thread")?;
        }
        Ok(())
    })?;

    Ok(server)
}

fn handle_post(
    runtime: &SharedRuntime,
    mut req: Request<&mut EspHttpConnection<'_>>,
    handler: fn(&mut DeviceController, &mut EspPlatform, &[u8]) -> ApiReply,
) -> anyhow::Result<()> {
    let body = match read_request_body(&mut req) {
        Ok(body) => body,
        Err(err) => return write_reply(req, &ApiReply::error(413, &format!("{err:#}"))),
    };

    let reply = {
        let mut guard = lock_runtime(runtime);
        let Runtime {
            controller,
            platform,
        } = &mut *guard;
        handler(controller, platform, &body)
    };
    write_reply(req, &reply)
}

fn read_request_body(req: &mut Request<&mut EspHttpConnection<'_>>) -> anyhow::Result<Vec<u8>> {
    let len = req.content_len().unwrap_or(0) as usize;
    if len > MAX_BODY_BYTES {
        return Err(anyhow!("request body too large"));
    }

    let mut body = vec![0_u8; len];
    if len > 0 {
        req.read_exact(&mut body)?;
    }
    Ok(body)
}

fn write_reply(req: Request<&mut EspHttpConnection<'_>>, reply: &ApiReply) -> anyhow::Result<()> {
    req.into_response(
        reply.status,
        None,
        &[("Content-Type", "application/json; charset=utf-8")],
    )?
    .write_all(reply.body.as_bytes())?;
    Ok(())
}

fn local_time_of_day() -> Option<TimeOfDay> {
    let mut now: sys::time_t = 0;
    unsafe { sys::time(&mut now) };
    if i64::from(now) < MIN_SYNCED_EPOCH {
        return None;
    }

    let mut tm: sys::tm = unsafe { core::mem::zeroed() };
    if unsafe { sys::localtime_r(&now, &mut tm) }.is_null() {
        return None;
    }
    TimeOfDay::new(tm.tm_hour as u8, tm.tm_min as u8, tm.tm_sec.min(59) as u8)
}

fn disable_wifi_power_save() {
    let rc = unsafe { sys::esp_wifi_set_ps(sys::wifi_ps_type_t_WIFI_PS_NONE) };
    if rc != sys::ESP_OK {
        warn!("failed to disable wifi power save: esp_err_t={rc}");
    }
}

fn monotonic_ms() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START
        .get_or_init(Instant::now)
        .elapsed()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}
