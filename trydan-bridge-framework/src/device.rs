//! Device side of the bridge.

use std::fmt;

use async_trait::async_trait;
use trydan_common::Snapshot;

use crate::error::{CommandError, ConnectError, ReadError};

/// A closed set of operations a device accepts from the bus.
///
/// Implementations are usually an enum with one variant per supported
/// operation. Unknown names must map to [`CommandError::Unsupported`].
pub trait DeviceCommand: fmt::Debug + fmt::Display + Send + Sync + Sized + 'static {
    /// Parse a command from its name (the last topic level) and raw payload.
    fn parse(name: &str, payload: &str) -> Result<Self, CommandError>;
}

/// One session with the polled device.
///
/// The poll loop and the command consumer share a session through an `Arc`,
/// so implementations must tolerate being called from both at once.
#[async_trait]
pub trait DeviceSession: Send + Sync + 'static {
    /// Commands this device understands.
    type Command: DeviceCommand;

    /// Human-readable address of the device, for logs.
    fn endpoint(&self) -> String;

    /// Establish the device link. Called once at startup.
    async fn connect(&self) -> Result<(), ConnectError>;

    /// Read the complete current device state.
    ///
    /// Either every required field is read or the call fails; a partially
    /// populated snapshot is never returned.
    async fn read_snapshot(&self) -> Result<Snapshot, ReadError>;

    /// Carry out an already-parsed command.
    async fn execute(&self, command: &Self::Command) -> Result<(), CommandError>;

    /// Parse and carry out a command received from the bus.
    async fn apply_command(
        &self,
        name: &str,
        payload: &str,
    ) -> Result<Self::Command, CommandError> {
        let command = Self::Command::parse(name, payload)?;
        self.execute(&command).await?;
        Ok(command)
    }

    /// Release the device link. Failures are logged by the implementation.
    async fn disconnect(&self);
}
