//! Trydan Bridge Framework
//!
//! Device-agnostic core for bridges that poll a device and mirror its state
//! onto MQTT.
//!
//! # Overview
//!
//! This framework provides:
//! - [`DeviceSession`] and [`DeviceCommand`] traits describing the polled device
//! - [`BusSession`] trait with the [`MqttBus`] implementation (rumqttc)
//! - [`CommandDispatcher`] turning inbound bus messages into device writes
//! - [`SnapshotPublisher`] for the per-field and aggregate telemetry topics
//! - [`AvailabilityTracker`] for the retained `online`/`offline` flag
//! - [`BridgeController`] driving the lifecycle (connect, poll, shut down)
//! - [`BridgeArgs`] and [`BridgeConfig`] for CLI and configuration loading
//!
//! # Example
//!
//! ```ignore
//! use tokio_util::sync::CancellationToken;
//! use trydan_bridge_framework::{BridgeArgs, BridgeConfig, BridgeController, MqttBus};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = BridgeArgs::parse();
//!     let config = MyBridgeConfig::load(args.resolve_config("mybridge.json5", &[]))?;
//!
//!     let cancel = CancellationToken::new();
//!     tokio::spawn(trydan_bridge_framework::shutdown_signal(cancel.clone()));
//!
//!     let bus = MqttBus::new(config.mqtt().clone());
//!     BridgeController::new("mybridge", MyDevice::new(), bus, config.topics(), cancel)
//!         .with_poll_interval(config.bridge().poll_interval())
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```

mod args;
mod availability;
mod bus;
mod config;
mod controller;
mod device;
mod dispatcher;
mod error;
pub mod memory;
mod mqtt;
mod publisher;
mod shutdown;

pub use args::{BridgeArgs, CONFIG_ENV};
pub use availability::{Availability, AvailabilityTracker};
pub use bus::{BusChannels, BusSession, InboundCommand, enqueue_command};
pub use config::{BridgeConfig, BridgeSettings};
pub use controller::{BridgeController, BridgeFlags, BridgeState, BridgeStatus, PollStats};
pub use device::{DeviceCommand, DeviceSession};
pub use dispatcher::CommandDispatcher;
pub use error::{BridgeError, CommandError, ConnectError, PublishError, ReadError, Result};
pub use mqtt::MqttBus;
pub use publisher::{OutboundMessage, PublishStats, SnapshotPublisher};
pub use shutdown::shutdown_signal;

// Re-export commonly used types from trydan-common
pub use trydan_common::{
    FieldValue, LoggingConfig, MqttConfig, Snapshot, TlsConfig, TopicBuilder,
};
