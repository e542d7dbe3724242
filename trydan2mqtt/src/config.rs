//! Configuration for the Trydan bridge.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use trydan_bridge_framework::{
    BridgeConfig, BridgeError, BridgeSettings, LoggingConfig, MqttConfig, Result,
};

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrydanBridgeConfig {
    /// Charger connection settings
    pub trydan: TrydanConfig,

    /// MQTT broker settings
    pub mqtt: MqttConfig,

    /// Poll loop settings
    pub bridge: BridgeSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BridgeConfig for TrydanBridgeConfig {
    fn mqtt(&self) -> &MqttConfig {
        &self.mqtt
    }

    fn bridge(&self) -> &BridgeSettings {
        &self.bridge
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn validate(&self) -> Result<()> {
        self.trydan.validate()?;
        self.validate_common()
    }
}

/// Charger HTTP API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrydanConfig {
    /// Charger hostname or IP address
    pub host: String,

    /// URL scheme: "http" (default) or "https"
    #[serde(default = "default_scheme")]
    pub scheme: String,

    /// Port, when the charger is not on the scheme's default port
    #[serde(default)]
    pub port: Option<u16>,

    /// Timeout for each HTTP request, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl TrydanConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            scheme: default_scheme(),
            port: None,
            timeout_secs: default_timeout_secs(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Base URL of the charger API, without a trailing slash.
    pub fn base_url(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}", self.scheme, self.host, port),
            None => format!("{}://{}", self.scheme, self.host),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(BridgeError::validation("trydan.host must not be empty"));
        }

        if self.host.contains('/') || self.host.contains(char::is_whitespace) {
            return Err(BridgeError::validation(format!(
                "trydan.host '{}' must be a bare hostname or IP address",
                self.host
            )));
        }

        if self.scheme != "http" && self.scheme != "https" {
            return Err(BridgeError::validation(format!(
                "trydan.scheme must be 'http' or 'https', got '{}'",
                self.scheme
            )));
        }

        if self.timeout_secs == 0 {
            return Err(BridgeError::validation(
                "trydan.timeout_secs must be at least 1",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trydan_bridge_framework::TopicBuilder;

    const FULL: &str = r#"{
        trydan: { host: "192.168.1.50", timeout_secs: 5 },
        mqtt: {
            host: "broker.local",
            port: 8883,
            client_id: "garage-charger",
            username: "bridge",
            password: "secret",
            tls: { enabled: true, ca_certs: "/etc/ssl/ca.pem" },
            topic_prefix: "home/trydan",
            qos: 1,
        },
        bridge: { poll_interval: 15 },
        logging: { level: "debug", format: "json" },
    }"#;

    #[test]
    fn test_parse_full_config() {
        let config = TrydanBridgeConfig::parse(FULL).unwrap();

        assert_eq!(config.trydan.base_url(), "http://192.168.1.50");
        assert_eq!(config.trydan.timeout(), Duration::from_secs(5));
        assert_eq!(config.mqtt.port, 8883);
        assert_eq!(config.mqtt.credentials(), Some(("bridge", "secret")));
        assert!(config.mqtt.tls.enabled);
        assert_eq!(config.bridge().poll_interval(), Duration::from_secs(15));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.topics(),
            TopicBuilder::new("home/trydan")
        );
    }

    #[test]
    fn test_defaults() {
        let config = TrydanBridgeConfig::parse(
            r#"{
                trydan: { host: "trydan.local" },
                mqtt: { host: "localhost", topic_prefix: "trydan" },
                bridge: {},
            }"#,
        )
        .unwrap();

        assert_eq!(config.trydan, TrydanConfig::new("trydan.local"));
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.client_id, "trydan");
        assert_eq!(config.mqtt.keepalive, 60);
        assert_eq!(config.bridge.poll_interval, 30);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_sections() {
        let result = TrydanBridgeConfig::parse(
            r#"{ mqtt: { host: "localhost", topic_prefix: "trydan" }, bridge: {} }"#,
        );
        assert!(matches!(result, Err(BridgeError::ConfigParse(_))));

        let result = TrydanBridgeConfig::parse(
            r#"{ trydan: { host: "trydan.local" }, mqtt: { host: "localhost", topic_prefix: "trydan" } }"#,
        );
        assert!(matches!(result, Err(BridgeError::ConfigParse(_))));
    }

    #[test]
    fn test_trydan_validation() {
        let mut trydan = TrydanConfig::new("http://192.168.1.50");
        assert!(trydan.validate().is_err());

        trydan.host = "192.168.1.50".to_string();
        trydan.validate().unwrap();

        trydan.scheme = "ftp".to_string();
        assert!(trydan.validate().is_err());

        trydan.scheme = "https".to_string();
        trydan.port = Some(8443);
        trydan.timeout_secs = 0;
        assert!(trydan.validate().is_err());

        trydan.timeout_secs = 3;
        assert_eq!(trydan.base_url(), "https://192.168.1.50:8443");
    }

    #[test]
    fn test_mqtt_validation_applies() {
        let result = TrydanBridgeConfig::parse(
            r#"{
                trydan: { host: "trydan.local" },
                mqtt: { host: "localhost", topic_prefix: "trydan", username: "only-user" },
                bridge: {},
            }"#,
        );
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trydan2mqtt.json5");
        std::fs::write(&path, FULL).unwrap();

        let config = TrydanBridgeConfig::load(&path).unwrap();
        assert_eq!(config.mqtt.client_id, "garage-charger");
    }
}
