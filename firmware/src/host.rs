use std::{
    collections::HashMap,
    io::ErrorKind,
    net::{SocketAddr, UdpSocket},
    path::PathBuf,
    sync::{Arc, OnceLock},
    time::{Duration, Instant},
};

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use smart_leds::RGB8;
use tokio::{net::TcpListener, sync::Mutex};
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use binclock_common::{
    api::{self, ApiReply, CAPTIVE_PROBE_PATHS, MAX_BODY_BYTES},
    dns, ClockConfig, DeviceController, DeviceMode, DisplayFrame, KeyValueStore, NetworkStatus,
    Platform, StoreError, TimeOfDay,
};

const SERVICE_INTERVAL_MS: u64 = 20;
const SIM_JOIN_LATENCY_MS: u64 = 1_500;
const SIM_AP_ADDR: [u8; 4] = [127, 0, 0, 1];

const SETUP_HTML: &str = include_str!("../web/setup.html");
const INDEX_HTML: &str = include_str!("../web/index.html");

#[derive(Clone)]
struct AppState {
    runtime: Arc<Mutex<Runtime>>,
}

struct Runtime {
    controller: DeviceController,
    platform: SimPlatform,
    config: ClockConfig,
}

impl Runtime {
    /// Simulated power cycle: radios and clocks reset, the store survives.
    fn reboot(&mut self) {
        self.platform.power_cycle();
        self.controller = DeviceController::boot(&mut self.platform, self.config.clone());
    }
}

/// JSON map persisted to `store.json` in the data directory.
struct FileStore {
    path: PathBuf,
    entries: HashMap<String, String>,
}

impl FileStore {
    fn open(data_dir: PathBuf) -> anyhow::Result<Self> {
        let path = data_dir.join("store.json");
        let entries = match std::fs::read(&path) {
            Ok(raw) => serde_json::from_slice(&raw)
                .with_context(|| format!("failed to parse store at {}", path.display()))?,
            Err(err) if err.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        Ok(Self { path, entries })
    }

    fn flush(&self) -> Result<(), StoreError> {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let staging = self.path.with_extension("json.tmp");
            std::fs::write(&staging, serde_json::to_vec_pretty(&self.entries)?)?;
            std::fs::rename(&staging, &self.path)
        };
        write().map_err(|err| StoreError::Backend(format!("{}: {err}", self.path.display())))
    }
}

impl KeyValueStore for FileStore {
    fn get_str(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set_str(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let previous = self.entries.insert(key.to_string(), value.to_string());
        self.flush().inspect_err(|_| match previous {
            Some(previous) => {
                self.entries.insert(key.to_string(), previous);
            }
            None => {
                self.entries.remove(key);
            }
        })
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let Some(previous) = self.entries.remove(key) else {
            return Ok(());
        };
        self.flush().inspect_err(|_| {
            self.entries.insert(key.to_string(), previous);
        })
    }
}

/// Desktop stand-in for the board: Wi-Fi outcome comes from the environment,
/// wall time from the host clock, and LED frames go to the log.
struct SimPlatform {
    store: FileStore,
    wifi_ok: bool,
    dns_port: u16,
    joined_at_ms: Option<u64>,
    dns_socket: Option<UdpSocket>,
    time_configured: bool,
    last_bits: Option<String>,
    status_color: Option<RGB8>,
    restart_requested: bool,
}

impl SimPlatform {
    fn power_cycle(&mut self) {
        self.joined_at_ms = None;
        self.dns_socket = None;
        self.time_configured = false;
        self.last_bits = None;
        self.status_color = None;
        self.restart_requested = false;
    }

    fn take_restart_request(&mut self) -> bool {
        std::mem::take(&mut self.restart_requested)
    }
}

impl Platform for SimPlatform {
    type Store = FileStore;

    fn store(&mut self) -> &mut Self::Store {
        &mut self.store
    }

    fn now_ms(&self) -> u64 {
        monotonic_ms()
    }

    fn delay_ms(&mut self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }

    fn begin_join(&mut self, ssid: &str, _password: &str) {
        info!("sim wifi: joining `{ssid}` (outcome: {})", if self.wifi_ok { "ok" } else { "fail" });
        self.joined_at_ms = Some(monotonic_ms());
    }

    fn network_status(&self) -> NetworkStatus {
        match self.joined_at_ms {
            Some(started)
                if self.wifi_ok && monotonic_ms().saturating_sub(started) >= SIM_JOIN_LATENCY_MS =>
            {
                NetworkStatus::Connected
            }
            _ => NetworkStatus::Disconnected,
        }
    }

    fn start_access_point(&mut self, ssid: &str) -> anyhow::Result<()> {
        info!("sim wifi: access point `{ssid}` up");
        Ok(())
    }

    fn start_captive_dns(&mut self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.dns_port));
        let socket =
            UdpSocket::bind(addr).with_context(|| format!("failed to bind captive dns at {addr}"))?;
        socket
            .set_nonblocking(true)
            .context("failed to make captive dns socket non-blocking")?;
        info!("captive dns listening on udp://{addr}");
        self.dns_socket = Some(socket);
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
        if let Some(response) = dns::captive_response(&buf[..len], SIM_AP_ADDR) {
            if let Err(err) = socket.send_to(&response, peer) {
                warn!("captive dns reply to {peer} failed: {err}");
            }
        }
    }

    fn register_mdns(&mut self, hostname: &str) -> anyhow::Result<()> {
        info!("sim mdns: advertising {hostname}.local");
        Ok(())
    }

    fn configure_time(&mut self, timezone_rule: &str) {
        // Only reached with the runtime lock held; nothing else touches the environment.
        std::env::set_var("TZ", timezone_rule);
        self.time_configured = true;
        info!("timezone set to `{timezone_rule}`");
    }

    fn time_now(&self) -> Option<TimeOfDay> {
        self.time_configured
            .then(|| TimeOfDay::from_chrono(&chrono::Local::now()))
    }

    fn render_frame(&mut self, frame: &DisplayFrame, brightness: u8) {
        let bits = frame.bit_string();
        if self.last_bits.as_deref() != Some(bits.as_str()) {
            debug!(brightness, lit = frame.lit_indices().count(), "leds {bits}");
            self.last_bits = Some(bits);
        }
    }

    fn set_status_led(&mut self, color: RGB8) {
        if self.status_color != Some(color) {
            info!("status led -> ({}, {}, {})", color.r, color.g, color.b);
            self.status_color = Some(color);
        }
    }

    fn restart(&mut self) {
        info!("restart requested");
        self.restart_requested = true;
    }
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let data_dir = std::env::var("BINCLOCK_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.binclock"));
    let wifi_ok = !std::env::var("BINCLOCK_SIM_WIFI")
        .map(|value| value.eq_ignore_ascii_case("fail"))
        .unwrap_or(false);
    let dns_port = std::env::var("BINCLOCK_DNS_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(5354);

    let mut platform = SimPlatform {
        store: FileStore::open(data_dir)?,
        wifi_ok,
        dns_port,
        joined_at_ms: None,
        dns_socket: None,
        time_configured: false,
        last_bits: None,
        status_color: None,
        restart_requested: false,
    };

    let config = ClockConfig::default();
    let runtime = tokio::task::spawn_blocking(move || {
        let controller = DeviceController::boot(&mut platform, config.clone());
        Runtime {
            controller,
            platform,
            config,
        }
    })
    .await
    .context("boot task panicked")?;

    let app_state = AppState {
        runtime: Arc::new(Mutex::new(runtime)),
    };
    spawn_service_loop(app_state.clone());

    let web_root = format!("{}/web", env!("CARGO_MANIFEST_DIR"));
    let mut app = Router::new()
        .route("/api/status", get(handle_get_status))
        .route(
            "/api/settings",
            get(handle_get_settings).post(handle_post_settings),
        )
        .route("/api/time", post(handle_post_time))
        .route("/api/wifi", post(handle_post_wifi))
        .route("/api/reset", post(handle_post_reset));
    for path in CAPTIVE_PROBE_PATHS {
        app = app.route(path, get(handle_page));
    }
    let app = app
        .fallback_service(ServeDir::new(web_root))
        .with_state(app_state);

    let port = std::env::var("BINCLOCK_HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind clock server at {addr}"))?;

    info!("binary clock simulator listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

fn spawn_service_loop(app_state: AppState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(SERVICE_INTERVAL_MS));
        loop {
            interval.tick().await;

            let mut runtime = app_state.runtime.lock().await;
            let Runtime {
                controller,
                platform,
                ..
            } = &mut *runtime;
            controller.service(platform);

            if platform.take_restart_request() {
                info!("simulated reboot");
                tokio::task::block_in_place(|| runtime.reboot());
            }
        }
    });
}

async fn handle_page(State(state): State<AppState>) -> Response {
    let mode = state.runtime.lock().await.controller.mode();
    match mode {
        DeviceMode::Provisioning => Html(SETUP_HTML).into_response(),
        DeviceMode::Operating => Html(INDEX_HTML).into_response(),
    }
}

async fn handle_get_status(State(state): State<AppState>) -> Response {
    let runtime = state.runtime.lock().await;
    json_reply(api::get_status(&runtime.controller, &runtime.platform))
}

async fn handle_get_settings(State(state): State<AppState>) -> Response {
    let runtime = state.runtime.lock().await;
    json_reply(api::get_settings(&runtime.controller))
}

async fn handle_post_settings(State(state): State<AppState>, body: Bytes) -> Response {
    if body.len() > MAX_BODY_BYTES {
        return json_reply(ApiReply::error(413, "request body too large"));
    }
    let mut runtime = state.runtime.lock().await;
    let Runtime {
        controller,
        platform,
        ..
    } = &mut *runtime;
    json_reply(api::post_settings(controller, platform, &body))
}

async fn handle_post_time(State(state): State<AppState>, body: Bytes) -> Response {
    if body.len() > MAX_BODY_BYTES {
        return json_reply(ApiReply::error(413, "request body too large"));
    }
    let mut runtime = state.runtime.lock().await;
    let Runtime {
        controller,
        platform,
        ..
    } = &mut *runtime;
    json_reply(api::post_time(controller, platform, &body))
}

async fn handle_post_wifi(State(state): State<AppState>, body: Bytes) -> Response {
    if body.len() > MAX_BODY_BYTES {
        return json_reply(ApiReply::error(413, "request body too large"));
    }
    let mut runtime = state.runtime.lock().await;
    let Runtime {
        controller,
        platform,
        ..
    } = &mut *runtime;
    json_reply(api::post_wifi(controller, platform, &body))
}

async fn handle_post_reset(State(state): State<AppState>) -> Response {
    let (reply, restart_in_ms) = {
        let mut runtime = state.runtime.lock().await;
        let Runtime {
            controller,
            platform,
            ..
        } = &mut *runtime;
        api::post_reset(controller, platform)
    };

    if let Some(delay_ms) = restart_in_ms {
        let runtime = state.runtime.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            runtime.lock().await.platform.restart();
        });
    }
    json_reply(reply)
}

fn json_reply(reply: ApiReply) -> Response {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
        reply.body,
    )
        .into_response()
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
