//! Bridge between a V2C Trydan EV charger and MQTT.
//!
//! Polls the charger's local HTTP API and mirrors its state onto MQTT, and
//! relays commands received on MQTT back to the charger.
//!
//! # Topics
//!
//! ```text
//! <prefix>/sensor/<field>     one retained message per snapshot field
//! <prefix>/data               the whole snapshot as JSON, retained
//! <prefix>/availability       "online" / "offline", retained
//! <prefix>/command/<name>     inbound commands (subscribed)
//! ```

pub mod charger;
pub mod commands;
pub mod config;

pub use charger::{RealTimeData, TrydanClient};
pub use commands::ChargerCommand;
pub use config::{TrydanBridgeConfig, TrydanConfig};

/// Config file used when neither the command line nor `CONFIG_PATH` names one.
pub const DEFAULT_CONFIG: &str = "/etc/trydan2mqtt/trydan2mqtt.json5";

/// Locations tried when the requested config file does not exist.
pub const FALLBACK_CONFIGS: &[&str] = &[
    "/app/config/trydan2mqtt.json5",
    "config/trydan2mqtt.json5",
    "trydan2mqtt.json5",
];

/// Directories searched for a writable log file when `logging.file` is unset.
pub const LOG_DIRS: &[&str] = &["/app/logs", "/var/log"];

/// File name of the log written into one of [`LOG_DIRS`].
pub const LOG_FILE_NAME: &str = "trydan2mqtt.log";
