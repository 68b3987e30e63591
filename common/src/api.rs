use serde::{Deserialize, Serialize};

use crate::{
    config::{ClockSettings, NetworkCredentials},
    device::{CredentialsError, DeviceController},
    platform::Platform,
    settings::{ManualTimeUpdate, SettingsUpdate},
};

pub const MAX_BODY_BYTES: usize = 2048;

pub const CAPTIVE_PROBE_PATHS: [&str; 7] = [
    "/",
    "/generate_204",
    "/gen_204",
    "/hotspot-detect.html",
    "/connecttest.txt",
    "/ncsi.txt",
    "/fwlink",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiReply {
    pub status: u16,
    pub body: String,
}

impl ApiReply {
    pub fn json<T: Serialize>(status: u16, payload: &T) -> Self {
        match serde_json::to_string(payload) {
            Ok(body) => Self { status, body },
            Err(err) => Self::error(500, &format!("failed to encode response: {err}")),
        }
    }

    pub fn error(status: u16, message: &str) -> Self {
        let body = serde_json::json!({ "error": message }).to_string();
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Serialize)]
struct SettingsReply {
    applied: Vec<&'static str>,
    rejected: Vec<&'static str>,
    settings: ClockSettings,
}

#[derive(Debug, Serialize)]
struct ResetReply {
    #[serde(rename = "restartInMs")]
    restart_in_ms: u64,
}

#[derive(Debug, Deserialize)]
struct WifiRequest {
    ssid: String,
    #[serde(default)]
    password: String,
}

pub fn get_status<P: Platform>(controller: &DeviceController, platform: &P) -> ApiReply {
    ApiReply::json(200, &controller.status(platform))
}

pub fn get_settings(controller: &DeviceController) -> ApiReply {
    ApiReply::json(200, &controller.settings())
}

pub fn post_settings<P: Platform>(
    controller: &mut DeviceController,
    platform: &mut P,
    body: &[u8],
) -> ApiReply {
    let update = match SettingsUpdate::from_json(body) {
        Ok(update) => update,
        Err(err) => return ApiReply::error(400, &format!("invalid settings payload: {err}")),
    };

    let outcome = controller.apply_settings_update(platform, update);
    ApiReply::json(
        200,
        &SettingsReply {
            applied: outcome.applied,
            rejected: outcome.rejected,
            settings: controller.settings(),
        },
    )
}

pub fn post_time<P: Platform>(
    controller: &mut DeviceController,
    platform: &mut P,
    body: &[u8],
) -> ApiReply {
    let update: ManualTimeUpdate = match serde_json::from_slice(body) {
        Ok(update) => update,
        Err(err) => return ApiReply::error(400, &format!("invalid time payload: {err}")),
    };

    match controller.set_manual_time(platform, update) {
        Ok(_) => ApiReply::json(200, &controller.status(platform)),
        Err(err) => ApiReply::error(400, &err.to_string()),
    }
}

pub fn post_wifi<P: Platform>(
    controller: &mut DeviceController,
    platform: &mut P,
    body: &[u8],
) -> ApiReply {
    let request: WifiRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(err) => return ApiReply::error(400, &format!("invalid wifi payload: {err}")),
    };

    match controller.update_credentials(
        platform,
        NetworkCredentials::new(request.ssid, request.password),
    ) {
        Ok(accepted) => ApiReply::json(200, &accepted),
        Err(err) => ApiReply::error(credentials_status(&err), &err.to_string()),
    }
}

/// On success also returns how long the caller waits before restarting; the
/// reply must be sent first.
pub fn post_reset<P: Platform>(
    controller: &mut DeviceController,
    platform: &mut P,
) -> (ApiReply, Option<u64>) {
    match controller.factory_reset(platform) {
        Ok(delay_ms) => (
            ApiReply::json(
                200,
                &ResetReply {
                    restart_in_ms: delay_ms,
                },
            ),
            Some(delay_ms),
        ),
        Err(err) => (ApiReply::error(credentials_status(&err), &err.to_string()), None),
    }
}

fn credentials_status(err: &CredentialsError) -> u16 {
    match err {
        CredentialsError::EmptySsid => 400,
        CredentialsError::RestartPending => 409,
        CredentialsError::Store(_) => 500,
    }
}
