//! Trydan Bridge Common Library
//!
//! Shared types and utilities for the Trydan MQTT bridge:
//!
//! - [`snapshot`] - Device snapshot data model (`Snapshot`, `FieldValue`)
//! - [`serialization`] - JSON and per-field payload encoding
//! - [`config`] - Shared configuration sections (MQTT, TLS, logging) in JSON5
//! - [`topics`] - MQTT topic builders and parsers
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod serialization;
pub mod snapshot;
pub mod topics;

// Re-export commonly used types at the crate root
pub use config::{
    LogFormat, LoggingConfig, MqttConfig, TlsConfig, load_config, open_log_file, parse_config,
};
pub use error::{Error, Result};
pub use serialization::{encode, field_payload};
pub use snapshot::{FieldValue, Snapshot, TIMESTAMP_FIELD};
pub use topics::{DEFAULT_TOPIC_PREFIX, TopicBuilder, validate_prefix};

/// Initialize tracing with the given configuration.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
///
/// Logs go to stdout, and are also appended to `config.file` when set.
/// `RUST_LOG` takes precedence over `config.level` when set.
///
/// # Example
///
/// ```ignore
/// use trydan_common::{LoggingConfig, LogFormat, init_tracing};
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Json,
///     file: None,
/// };
/// init_tracing(&config)?;
/// ```
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use std::sync::Mutex;
    use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let file = config
        .file
        .as_deref()
        .map(open_log_file)
        .transpose()?
        .map(Mutex::new);

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    match config.format {
        LogFormat::Text => {
            layers.push(fmt::layer().boxed());
            if let Some(file) = file {
                layers.push(fmt::layer().with_ansi(false).with_writer(file).boxed());
            }
        }
        LogFormat::Json => {
            layers.push(fmt::layer().json().boxed());
            if let Some(file) = file {
                layers.push(fmt::layer().json().with_writer(file).boxed());
            }
        }
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))
}
