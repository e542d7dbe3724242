//! Inbound command dispatch.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bus::InboundCommand;
use crate::device::DeviceSession;
use crate::error::CommandError;

/// Routes inbound bus commands to the device.
///
/// A single consumer drains the queue, so one command's device call always
/// finishes before the next command starts. Failures are logged locally and
/// never published.
pub struct CommandDispatcher<D: DeviceSession> {
    device: Arc<D>,
}

impl<D: DeviceSession> Clone for CommandDispatcher<D> {
    fn clone(&self) -> Self {
        Self {
            device: Arc::clone(&self.device),
        }
    }
}

impl<D: DeviceSession> CommandDispatcher<D> {
    pub fn new(device: Arc<D>) -> Self {
        Self { device }
    }

    /// Parse and execute one command, logging the outcome.
    pub async fn dispatch(&self, command: InboundCommand) -> Result<D::Command, CommandError> {
        let result = self
            .device
            .apply_command(&command.name, &command.payload)
            .await;

        match &result {
            Ok(parsed) => tracing::info!(
                command = %command.name,
                action = %parsed,
                "Command applied"
            ),
            Err(CommandError::Unsupported(name)) => {
                tracing::warn!(command = %name, "Ignoring unknown command")
            }
            Err(e) => tracing::warn!(
                command = %command.name,
                payload = %command.payload,
                error = %e,
                "Command failed"
            ),
        }

        result
    }

    /// Spawn the consumer task.
    ///
    /// The task ends when `cancel` fires or the queue is closed. A command
    /// already being executed when `cancel` fires is allowed to finish.
    pub fn spawn(
        self,
        mut commands: mpsc::Receiver<InboundCommand>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let command = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    command = commands.recv() => match command {
                        Some(command) => command,
                        None => {
                            tracing::debug!("Command queue closed");
                            break;
                        }
                    },
                };

                let _ = self.dispatch(command).await;
            }
            tracing::debug!("Command consumer stopped");
        })
    }
}
