use std::collections::HashMap;

use log::warn;
use thiserror::Error;

use crate::config::{ClockSettings, NetworkCredentials};

pub const KEY_SETTINGS: &str = "settings_json";
pub const KEY_WIFI_SSID: &str = "wifi_ssid";
pub const KEY_WIFI_PASS: &str = "wifi_pass";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("stored value for `{key}` is not valid: {source}")]
    Decode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode value for `{key}`: {source}")]
    Encode {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Typed key/value persistence. Writes are synchronous and atomic per key.
pub trait KeyValueStore {
    fn get_str(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set_str(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

pub fn get_str_or<S: KeyValueStore + ?Sized>(store: &S, key: &str, default: &str) -> String {
    match store.get_str(key) {
        Ok(Some(value)) => value,
        Ok(None) => default.to_string(),
        Err(err) => {
            warn!("failed to read `{key}` from store: {err}");
            default.to_string()
        }
    }
}

#[derive(Debug)]
pub struct LoadedSettings {
    pub settings: ClockSettings,
    pub first_boot: bool,
}

pub fn load_settings<S: KeyValueStore + ?Sized>(store: &S) -> Result<LoadedSettings, StoreError> {
    let Some(raw) = store.get_str(KEY_SETTINGS)? else {
        return Ok(LoadedSettings {
            settings: ClockSettings::default(),
            first_boot: true,
        });
    };

    let mut settings = serde_json::from_str::<ClockSettings>(&raw).map_err(|source| {
        StoreError::Decode {
            key: KEY_SETTINGS,
            source,
        }
    })?;
    settings.sanitize();
    Ok(LoadedSettings {
        settings,
        first_boot: false,
    })
}

pub fn save_settings<S: KeyValueStore + ?Sized>(
    store: &mut S,
    settings: &ClockSettings,
) -> Result<(), StoreError> {
    let payload = serde_json::to_string(settings).map_err(|source| StoreError::Encode {
        key: KEY_SETTINGS,
        source,
    })?;
    store.set_str(KEY_SETTINGS, &payload)
}

pub fn load_credentials<S: KeyValueStore + ?Sized>(store: &S) -> NetworkCredentials {
    NetworkCredentials {
        ssid: get_str_or(store, KEY_WIFI_SSID, ""),
        password: get_str_or(store, KEY_WIFI_PASS, ""),
    }
}

pub fn save_credentials<S: KeyValueStore + ?Sized>(
    store: &mut S,
    credentials: &NetworkCredentials,
) -> Result<(), StoreError> {
    store.set_str(KEY_WIFI_SSID, &credentials.ssid)?;
    store.set_str(KEY_WIFI_PASS, &credentials.password)
}

pub fn erase_credentials<S: KeyValueStore + ?Sized>(store: &mut S) -> Result<(), StoreError> {
    store.remove(KEY_WIFI_SSID)?;
    store.remove(KEY_WIFI_PASS)
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    pub fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_str(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set_str(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Backend(format!("write to `{key}` rejected")));
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Backend(format!("remove of `{key}` rejected")));
        }
        self.entries.remove(key);
        Ok(())
    }
}
