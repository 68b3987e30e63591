use serde::{Deserialize, Serialize};

use crate::config::ClockSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceMode {
    Provisioning,
    Operating,
}

impl DeviceMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Provisioning => "PROVISIONING",
            Self::Operating => "OPERATING",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinResult {
    Connected,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClockStatus {
    pub time: String,
    #[serde(rename = "timeAvailable")]
    pub time_available: bool,
    pub mode: &'static str,
    pub version: &'static str,
    #[serde(rename = "restartPending")]
    pub restart_pending: bool,
    #[serde(rename = "restartInMs")]
    pub restart_in_ms: Option<u64>,
    pub settings: ClockSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct CredentialsAccepted {
    pub ssid: String,
    #[serde(rename = "restartInMs")]
    pub restart_in_ms: u64,
}
