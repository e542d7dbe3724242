use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::topics::validate_prefix;

/// MQTT broker connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker hostname or IP address.
    pub host: String,

    /// Broker port.
    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// MQTT client identifier.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Optional username (requires `password`).
    #[serde(default)]
    pub username: Option<String>,

    /// Optional password (requires `username`).
    #[serde(default)]
    pub password: Option<String>,

    /// Transport security.
    #[serde(default)]
    pub tls: TlsConfig,

    /// Prefix for every topic the bridge publishes or subscribes to.
    pub topic_prefix: String,

    /// Keep-alive interval in seconds.
    #[serde(default = "default_keepalive")]
    pub keepalive: u64,

    /// QoS level for publishes and the command subscription (0, 1 or 2).
    #[serde(default)]
    pub qos: u8,

    /// Timeout applied to the connect handshake and every bus operation.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,

    /// Delay before the transport retries after a connection error.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,

    /// Capacity of the inbound command queue.
    #[serde(default = "default_inbound_queue")]
    pub inbound_queue: usize,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "trydan".to_string()
}

fn default_keepalive() -> u64 {
    60
}

fn default_operation_timeout() -> u64 {
    10
}

fn default_reconnect_delay() -> u64 {
    5
}

fn default_inbound_queue() -> usize {
    64
}

impl MqttConfig {
    /// Configuration for a broker with every optional setting at its default.
    pub fn new(host: impl Into<String>, topic_prefix: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_mqtt_port(),
            client_id: default_client_id(),
            username: None,
            password: None,
            tls: TlsConfig::default(),
            topic_prefix: topic_prefix.into(),
            keepalive: default_keepalive(),
            qos: 0,
            operation_timeout_secs: default_operation_timeout(),
            reconnect_delay_secs: default_reconnect_delay(),
            inbound_queue: default_inbound_queue(),
        }
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    /// Username and password, when both are configured.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }

    /// Validate the broker settings.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("mqtt.host cannot be empty".to_string()));
        }

        if self.client_id.is_empty() {
            return Err(Error::Config("mqtt.client_id cannot be empty".to_string()));
        }

        validate_prefix(&self.topic_prefix)
            .map_err(|e| Error::Config(format!("mqtt.topic_prefix: {}", e)))?;

        if self.username.is_some() != self.password.is_some() {
            return Err(Error::Config(
                "mqtt.username and mqtt.password must be set together".to_string(),
            ));
        }

        if self.qos > 2 {
            return Err(Error::Config(format!(
                "mqtt.qos must be 0, 1 or 2 (got {})",
                self.qos
            )));
        }

        // rumqttc rejects keep-alive intervals below five seconds
        if self.keepalive < 5 {
            return Err(Error::Config(
                "mqtt.keepalive must be at least 5 seconds".to_string(),
            ));
        }

        if self.operation_timeout_secs == 0 {
            return Err(Error::Config(
                "mqtt.operation_timeout_secs must be at least 1".to_string(),
            ));
        }

        if self.inbound_queue == 0 {
            return Err(Error::Config(
                "mqtt.inbound_queue must be at least 1".to_string(),
            ));
        }

        self.tls.validate()
    }
}

/// TLS settings for the broker connection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Enable TLS.
    #[serde(default)]
    pub enabled: bool,

    /// CA certificate bundle (PEM). System roots are used when absent.
    #[serde(default)]
    pub ca_certs: Option<PathBuf>,

    /// Client certificate (PEM), for mutual TLS.
    #[serde(default)]
    pub certfile: Option<PathBuf>,

    /// Client private key (PEM), for mutual TLS.
    #[serde(default)]
    pub keyfile: Option<PathBuf>,
}

impl TlsConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.certfile.is_some() != self.keyfile.is_some() {
            return Err(Error::Config(
                "mqtt.tls.certfile and mqtt.tls.keyfile must be set together".to_string(),
            ));
        }

        if self.certfile.is_some() && self.ca_certs.is_none() {
            return Err(Error::Config(
                "mqtt.tls.ca_certs is required for client certificate authentication"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Common logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,

    /// Also append logs to this file.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Fill in `file` with `file_name` inside the first of `dirs` where it can
    /// be opened for appending. A configured `file` is left untouched.
    pub fn with_default_file(mut self, dirs: &[impl AsRef<Path>], file_name: &str) -> Self {
        if self.file.is_none() {
            self.file = dirs
                .iter()
                .map(AsRef::<Path>::as_ref)
                .filter(|dir| dir.is_dir())
                .map(|dir| dir.join(file_name))
                .find(|path| open_log_file(path).is_ok());
        }
        self
    }
}

/// Open a log file for appending, creating it when missing.
pub fn open_log_file(path: &Path) -> Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            Error::Config(format!(
                "Failed to open log file '{}': {}",
                path.display(),
                e
            ))
        })
}

/// Load a configuration file in JSON5 format.
pub fn load_config<T: for<'de> Deserialize<'de>>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;

    json5::from_str(&content).map_err(|e| {
        Error::Config(format!(
            "Failed to parse config file '{}': {}",
            path.display(),
            e
        ))
    })
}

/// Load a configuration from a JSON5 string.
pub fn parse_config<T: for<'de> Deserialize<'de>>(content: &str) -> Result<T> {
    json5::from_str(content).map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
}
