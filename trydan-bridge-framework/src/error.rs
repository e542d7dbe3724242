//! Error types for the bridge framework.
//!
//! [`BridgeError`] covers everything that stops the bridge (configuration and
//! startup failures). The per-operation errors ([`ReadError`],
//! [`CommandError`], [`PublishError`]) are recoverable: once the bridge is
//! running they are logged and the loop carries on.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that stop a bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// The device could not be reached at startup.
    #[error("Device connection failed: {0}")]
    DeviceConnect(#[source] ConnectError),

    /// The broker could not be reached at startup.
    #[error("Bus connection failed: {0}")]
    BusConnect(#[source] ConnectError),

    /// A bridge task ended unexpectedly.
    #[error("Worker error: {0}")]
    Worker(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }

    /// Create a worker error.
    pub fn worker(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }
}

impl From<json5::Error> for BridgeError {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

impl From<trydan_common::Error> for BridgeError {
    fn from(err: trydan_common::Error) -> Self {
        match err {
            trydan_common::Error::Config(msg) => Self::ConfigValidation(msg),
            trydan_common::Error::Topic(msg) => Self::ConfigValidation(msg),
            trydan_common::Error::Json(e) => Self::ConfigParse(e.to_string()),
            trydan_common::Error::Io(e) => Self::Io(e),
        }
    }
}

/// Failure to establish a device or broker session.
#[derive(Error, Debug)]
pub enum ConnectError {
    /// The peer could not be reached or dropped the connection.
    #[error("{endpoint} unreachable: {message}")]
    Unreachable { endpoint: String, message: String },

    /// The handshake did not complete in time.
    #[error("{endpoint} did not answer within {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    /// The peer answered but refused the session.
    #[error("{endpoint} refused the session: {reason}")]
    Rejected { endpoint: String, reason: String },

    /// Local connection settings are unusable (bad certificate path, etc.).
    #[error("Invalid connection settings: {0}")]
    Settings(String),
}

/// Failure to read a device snapshot. The poll cycle is skipped.
#[derive(Error, Debug)]
pub enum ReadError {
    /// Transport failure talking to the device.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The device did not answer in time.
    #[error("Read timed out after {0:?}")]
    Timeout(Duration),

    /// The device answered with an error status.
    #[error("Device returned an error: {0}")]
    Rejected(String),

    /// The response could not be mapped to a complete snapshot.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Failure to carry out one inbound command. Logged, never sent back on the bus.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The command name is not one the device supports.
    #[error("Unsupported command '{0}'")]
    Unsupported(String),

    /// The payload could not be coerced to the type the command needs.
    #[error("Invalid payload {payload:?} for '{command}': {reason}")]
    InvalidPayload {
        command: String,
        payload: String,
        reason: String,
    },

    /// The device answered the write with an error.
    #[error("Device rejected command: {0}")]
    DeviceRejected(String),

    /// The write request itself failed or timed out.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl CommandError {
    /// Create an invalid payload error.
    pub fn invalid_payload(
        command: impl Into<String>,
        payload: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidPayload {
            command: command.into(),
            payload: payload.into(),
            reason: reason.into(),
        }
    }
}

/// Failure to publish one message. Logged; the cycle continues.
#[derive(Error, Debug)]
pub enum PublishError {
    /// The client rejected the publish request.
    #[error("Failed to publish to {topic}: {message}")]
    Send { topic: String, message: String },

    /// The client did not accept the publish in time.
    #[error("Publishing to {topic} timed out after {timeout:?}")]
    Timeout { topic: String, timeout: Duration },

    /// The payload could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = BridgeError::DeviceConnect(ConnectError::Timeout {
            endpoint: "http://192.168.1.50".to_string(),
            timeout: Duration::from_secs(10),
        });
        assert_eq!(
            err.to_string(),
            "Device connection failed: http://192.168.1.50 did not answer within 10s"
        );

        let err = CommandError::invalid_payload("set_charge_current", "abc", "not a number");
        assert_eq!(
            err.to_string(),
            "Invalid payload \"abc\" for 'set_charge_current': not a number"
        );
    }

    #[test]
    fn test_from_common_error() {
        let err: BridgeError = trydan_common::Error::Config("bad prefix".to_string()).into();
        assert!(matches!(err, BridgeError::ConfigValidation(_)));
    }
}
