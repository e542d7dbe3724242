//! Bridge controller for lifecycle management.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use trydan_common::TopicBuilder;

use crate::availability::{Availability, AvailabilityTracker};
use crate::bus::{BusChannels, BusSession};
use crate::device::DeviceSession;
use crate::dispatcher::CommandDispatcher;
use crate::error::{BridgeError, Result};
use crate::publisher::SnapshotPublisher;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// How long shutdown waits for an in-flight command to finish.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle state of a [`BridgeController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BridgeState {
    #[default]
    Starting,
    ConnectingDevice,
    ConnectingBus,
    Running,
    ShuttingDown,
    Stopped,
}

impl fmt::Display for BridgeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::ConnectingDevice => "connecting_device",
            Self::ConnectingBus => "connecting_bus",
            Self::Running => "running",
            Self::ShuttingDown => "shutting_down",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Connection flags tracked alongside the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BridgeFlags {
    pub running: bool,
    pub device_connected: bool,
    pub bus_connected: bool,
}

/// Observable status of a controller: lifecycle state plus flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BridgeStatus {
    pub state: BridgeState,
    pub flags: BridgeFlags,
}

/// Counters for the poll loop, returned when the controller stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollStats {
    /// Poll cycles started.
    pub cycles: u64,
    /// Snapshots read and handed to the publisher.
    pub snapshots: u64,
    /// Cycles skipped because the read failed.
    pub read_failures: u64,
    /// Individual messages that failed to publish.
    pub publish_failures: u64,
}

/// Drives one bridge from startup to shutdown.
///
/// Connects the device, then the bus, publishes `online`, and polls the
/// device every `poll_interval` until `cancel` fires or the command consumer
/// dies. Shutdown publishes `offline` and disconnects both sessions.
///
/// # Example
///
/// ```ignore
/// let cancel = CancellationToken::new();
/// tokio::spawn(shutdown_signal(cancel.clone()));
///
/// let stats = BridgeController::new("trydan", charger, MqttBus::new(mqtt), topics, cancel)
///     .with_poll_interval(Duration::from_secs(30))
///     .run()
///     .await?;
/// ```
pub struct BridgeController<D: DeviceSession, B: BusSession> {
    name: String,
    device: Arc<D>,
    bus: B,
    publisher: SnapshotPublisher,
    availability: AvailabilityTracker,
    poll_interval: Duration,
    drain_timeout: Duration,
    cancel: CancellationToken,
    status: watch::Sender<BridgeStatus>,
    stats: PollStats,
}

impl<D: DeviceSession, B: BusSession> BridgeController<D, B> {
    pub fn new(
        name: impl Into<String>,
        device: D,
        bus: B,
        topics: TopicBuilder,
        cancel: CancellationToken,
    ) -> Self {
        let (status, _) = watch::channel(BridgeStatus::default());
        Self {
            name: name.into(),
            device: Arc::new(device),
            bus,
            availability: AvailabilityTracker::new(topics.availability()),
            publisher: SnapshotPublisher::new(topics),
            poll_interval: DEFAULT_POLL_INTERVAL,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            cancel,
            status,
            stats: PollStats::default(),
        }
    }

    /// Set the interval between two poll cycles.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set how long shutdown waits for the command consumer.
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Subscribe to state and flag changes.
    pub fn status_watch(&self) -> watch::Receiver<BridgeStatus> {
        self.status.subscribe()
    }

    /// Run the bridge until cancelled.
    ///
    /// Startup connection failures are returned without publishing any
    /// availability. An unexpected end of the command consumer runs the full
    /// shutdown sequence and is then returned as [`BridgeError::Worker`].
    pub async fn run(mut self) -> Result<PollStats> {
        tracing::info!(
            bridge = %self.name,
            version = env!("CARGO_PKG_VERSION"),
            "Starting bridge"
        );

        let BusChannels {
            commands,
            mut connected,
        } = self.connect().await?;

        self.set_state(BridgeState::Running);
        self.update_flags(|flags| flags.running = true);
        self.availability.set(&self.bus, Availability::Online).await;

        tracing::info!(
            bridge = %self.name,
            poll_interval = ?self.poll_interval,
            "Bridge running"
        );

        let consumer_cancel = self.cancel.child_token();
        let mut consumer =
            CommandDispatcher::new(Arc::clone(&self.device)).spawn(commands, consumer_cancel.clone());

        let outcome = self.poll_loop(&mut consumer, &mut connected).await;

        self.shutdown(consumer, consumer_cancel).await;

        match outcome {
            Ok(()) => {
                tracing::info!(
                    bridge = %self.name,
                    cycles = self.stats.cycles,
                    snapshots = self.stats.snapshots,
                    read_failures = self.stats.read_failures,
                    "Bridge stopped"
                );
                Ok(self.stats)
            }
            Err(e) => {
                tracing::error!(bridge = %self.name, error = %e, "Bridge stopped after failure");
                Err(e)
            }
        }
    }

    /// Connect the device, then the bus.
    async fn connect(&mut self) -> Result<BusChannels> {
        self.set_state(BridgeState::ConnectingDevice);
        let endpoint = self.device.endpoint();
        tracing::info!(endpoint = %endpoint, "Connecting to device");

        if let Err(e) = self.device.connect().await {
            tracing::error!(endpoint = %endpoint, error = %e, "Device connection failed");
            self.set_state(BridgeState::Stopped);
            return Err(BridgeError::DeviceConnect(e));
        }
        self.update_flags(|flags| flags.device_connected = true);
        tracing::info!(endpoint = %endpoint, "Connected to device");

        self.set_state(BridgeState::ConnectingBus);
        match self.bus.connect().await {
            Ok(channels) => {
                self.update_flags(|flags| flags.bus_connected = true);
                Ok(channels)
            }
            Err(e) => {
                tracing::error!(error = %e, "Bus connection failed");
                self.device.disconnect().await;
                self.update_flags(|flags| flags.device_connected = false);
                self.set_state(BridgeState::Stopped);
                Err(BridgeError::BusConnect(e))
            }
        }
    }

    async fn poll_loop(
        &mut self,
        consumer: &mut JoinHandle<()>,
        connected: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let mut bus_events = true;

        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            self.poll_once().await;

            let sleep = tokio::time::sleep(self.poll_interval);
            tokio::pin!(sleep);

            loop {
                tokio::select! {
                    biased;

                    _ = self.cancel.cancelled() => {
                        tracing::info!(bridge = %self.name, "Shutdown requested");
                        return Ok(());
                    }

                    result = &mut *consumer => {
                        let reason = match result {
                            Ok(()) => "command consumer stopped unexpectedly".to_string(),
                            Err(e) => format!("command consumer failed: {}", e),
                        };
                        return Err(BridgeError::worker(reason));
                    }

                    changed = connected.changed(), if bus_events => match changed {
                        Ok(()) => {
                            let up = *connected.borrow_and_update();
                            self.on_bus_connection(up);
                        }
                        Err(_) => bus_events = false,
                    },

                    _ = &mut sleep => break,
                }
            }
        }
    }

    /// One read-then-publish cycle. Failures are logged and the cycle skipped.
    async fn poll_once(&mut self) {
        self.stats.cycles += 1;

        let snapshot = match self.device.read_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.stats.read_failures += 1;
                tracing::warn!(
                    cycle = self.stats.cycles,
                    error = %e,
                    "Device read failed, skipping cycle"
                );
                return;
            }
        };

        let published = self.publisher.publish(&self.bus, &snapshot).await;
        self.stats.snapshots += 1;
        self.stats.publish_failures += published.failed as u64;

        tracing::debug!(
            cycle = self.stats.cycles,
            fields = snapshot.field_count(),
            published = published.success,
            failed = published.failed,
            "Published snapshot"
        );
    }

    fn on_bus_connection(&self, up: bool) {
        let was_up = self.status.borrow().flags.bus_connected;
        if up == was_up {
            return;
        }

        self.update_flags(|flags| flags.bus_connected = up);
        if up {
            tracing::info!(bridge = %self.name, "Bus connection restored");
        } else {
            tracing::warn!(bridge = %self.name, "Bus connection lost, polling continues");
        }
    }

    async fn shutdown(&mut self, mut consumer: JoinHandle<()>, consumer_cancel: CancellationToken) {
        self.set_state(BridgeState::ShuttingDown);
        self.update_flags(|flags| flags.running = false);

        self.availability.set(&self.bus, Availability::Offline).await;

        consumer_cancel.cancel();
        if !consumer.is_finished() {
            match tokio::time::timeout(self.drain_timeout, &mut consumer).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Command consumer failed"),
                Err(_) => {
                    tracing::warn!("Command consumer did not stop in time, aborting");
                    consumer.abort();
                }
            }
        }

        self.device.disconnect().await;
        self.update_flags(|flags| flags.device_connected = false);

        self.bus.disconnect().await;
        self.update_flags(|flags| flags.bus_connected = false);

        self.set_state(BridgeState::Stopped);
    }

    fn set_state(&self, state: BridgeState) {
        self.status.send_modify(|status| status.state = state);
        tracing::debug!(bridge = %self.name, state = %state, "State changed");
    }

    fn update_flags(&self, update: impl FnOnce(&mut BridgeFlags)) {
        self.status.send_modify(|status| update(&mut status.flags));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(BridgeState::default(), BridgeState::Starting);
        assert_eq!(BridgeState::ConnectingDevice.to_string(), "connecting_device");
        assert_eq!(BridgeState::Stopped.to_string(), "stopped");
    }

    #[test]
    fn test_default_status() {
        let status = BridgeStatus::default();
        assert_eq!(status.state, BridgeState::Starting);
        assert!(!status.flags.running);
        assert!(!status.flags.device_connected);
        assert!(!status.flags.bus_connected);
    }
}
