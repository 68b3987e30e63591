pub mod animation;
pub mod api;
pub mod clock;
pub mod color;
pub mod config;
pub mod device;
pub mod display;
pub mod dns;
pub mod platform;
pub mod settings;
pub mod status;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::{DisplayTime, ManualClock, TimeOfDay, UNAVAILABLE_TEXT};
pub use config::{ClockConfig, ClockSettings, NetworkCredentials, FIRMWARE_VERSION};
pub use device::{CredentialsError, DeviceController, PendingRestart};
pub use display::{DisplayFrame, FieldColors, LED_COUNT};
pub use platform::Platform;
pub use settings::{ManualTimeError, ManualTimeUpdate, SettingsUpdate, UpdateOutcome};
pub use store::{KeyValueStore, MemoryStore, StoreError};
pub use types::{ClockStatus, CredentialsAccepted, DeviceMode, JoinResult, NetworkStatus};
