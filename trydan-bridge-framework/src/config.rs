//! Configuration traits and utilities.

use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::{LoggingConfig, MqttConfig, TopicBuilder};

/// Settings of the bridge core itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeSettings {
    /// Seconds between two poll cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
}

fn default_poll_interval() -> u64 {
    30
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
        }
    }
}

impl BridgeSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval == 0 {
            return Err(BridgeError::validation(
                "bridge.poll_interval must be at least 1 second",
            ));
        }
        Ok(())
    }
}

/// Trait for bridge configuration types.
///
/// Implement this trait for your bridge's configuration struct to get
/// loading, validation, and access to the shared sections.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use trydan_bridge_framework::{BridgeConfig, BridgeSettings, LoggingConfig, MqttConfig};
///
/// #[derive(Debug, Deserialize)]
/// pub struct MyBridgeConfig {
///     pub mqtt: MqttConfig,
///     pub bridge: BridgeSettings,
///     #[serde(default)]
///     pub logging: LoggingConfig,
/// }
///
/// impl BridgeConfig for MyBridgeConfig {
///     fn mqtt(&self) -> &MqttConfig {
///         &self.mqtt
///     }
///
///     fn bridge(&self) -> &BridgeSettings {
///         &self.bridge
///     }
///
///     fn logging(&self) -> &LoggingConfig {
///         &self.logging
///     }
/// }
/// ```
pub trait BridgeConfig: Sized + DeserializeOwned {
    /// Get the MQTT configuration.
    fn mqtt(&self) -> &MqttConfig;

    /// Get the bridge core settings.
    fn bridge(&self) -> &BridgeSettings;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Topic builder for the configured prefix.
    fn topics(&self) -> TopicBuilder {
        TopicBuilder::new(&self.mqtt().topic_prefix)
    }

    /// Validate the configuration.
    ///
    /// Called automatically after loading. The default checks the shared
    /// sections; override to add device checks and call
    /// [`validate_common`](Self::validate_common).
    fn validate(&self) -> Result<()> {
        self.validate_common()
    }

    /// Validate the MQTT and bridge sections.
    fn validate_common(&self) -> Result<()> {
        self.mqtt().validate()?;
        self.bridge().validate()
    }

    /// Load configuration from a file path.
    ///
    /// Supports JSON5 format. Calls [`validate`](Self::validate) after loading.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a JSON5 string.
    fn parse(content: &str) -> Result<Self> {
        let config: Self = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        mqtt: MqttConfig,
        bridge: BridgeSettings,
        #[serde(default)]
        logging: LoggingConfig,
    }

    impl BridgeConfig for TestConfig {
        fn mqtt(&self) -> &MqttConfig {
            &self.mqtt
        }

        fn bridge(&self) -> &BridgeSettings {
            &self.bridge
        }

        fn logging(&self) -> &LoggingConfig {
            &self.logging
        }
    }

    #[test]
    fn test_config_not_found() {
        let result = TestConfig::load("/nonexistent/path.json5");
        assert!(matches!(result, Err(BridgeError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.json5");
        std::fs::write(
            &path,
            r#"{
                // comments are fine in JSON5
                mqtt: { host: "broker.local", topic_prefix: "garage/trydan" },
                bridge: { poll_interval: 5 },
            }"#,
        )
        .unwrap();

        let config = TestConfig::load(&path).unwrap();
        assert_eq!(config.bridge().poll_interval(), Duration::from_secs(5));
        assert_eq!(config.logging().level, "info");
        assert_eq!(config.topics().data(), "garage/trydan/data");
    }

    #[test]
    fn test_missing_section_is_parse_error() {
        let result = TestConfig::parse(r#"{ mqtt: { host: "broker.local", topic_prefix: "t" } }"#);
        assert!(matches!(result, Err(BridgeError::ConfigParse(_))));
    }

    #[test]
    fn test_validation_errors() {
        let result = TestConfig::parse(
            r#"{ mqtt: { host: "broker.local", topic_prefix: "t" }, bridge: { poll_interval: 0 } }"#,
        );
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));

        let result = TestConfig::parse(
            r#"{ mqtt: { host: "broker.local", topic_prefix: "t/#" }, bridge: {} }"#,
        );
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));
    }

    #[test]
    fn test_bridge_settings_default() {
        let settings = BridgeSettings::default();
        assert_eq!(settings.poll_interval(), Duration::from_secs(30));
    }
}
