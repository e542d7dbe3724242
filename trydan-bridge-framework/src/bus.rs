//! Message bus side of the bridge.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use trydan_common::TopicBuilder;

use crate::error::{ConnectError, PublishError};

/// A command received from the bus, not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundCommand {
    /// Command name (last level of the command topic).
    pub name: String,
    /// Raw payload, decoded as UTF-8.
    pub payload: String,
    /// When the transport received the message.
    pub received_at: DateTime<Utc>,
}

impl InboundCommand {
    pub fn new(name: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
            received_at: Utc::now(),
        }
    }
}

/// Channels handed to the controller by a successful [`BusSession::connect`].
#[derive(Debug)]
pub struct BusChannels {
    /// Bounded queue of inbound commands, filled by the transport.
    pub commands: mpsc::Receiver<InboundCommand>,
    /// Broker connection state; flips on disconnect and reconnect.
    pub connected: watch::Receiver<bool>,
}

/// One session with the message bus.
#[async_trait]
pub trait BusSession: Send + Sync + 'static {
    /// Open the session and subscribe to the command topics.
    async fn connect(&mut self) -> Result<BusChannels, ConnectError>;

    /// Send one message. Bounded in time; never blocks the caller indefinitely.
    async fn publish(&self, topic: &str, payload: Vec<u8>, retain: bool)
    -> Result<(), PublishError>;

    /// Close the session. Failures are logged by the implementation.
    async fn disconnect(&mut self);
}

/// Turn a raw inbound message into an [`InboundCommand`] and queue it.
///
/// Never waits for queue space: when the consumer is behind, the message is
/// dropped with a warning so the transport keeps reading. Returns `true`
/// when the command was queued.
pub fn enqueue_command(
    topics: &TopicBuilder,
    queue: &mpsc::Sender<InboundCommand>,
    topic: &str,
    payload: &[u8],
) -> bool {
    let Some(name) = topics.parse_command(topic) else {
        tracing::debug!(topic = %topic, "Ignoring message outside the command namespace");
        return false;
    };

    let payload = match std::str::from_utf8(payload) {
        Ok(payload) => payload.trim(),
        Err(e) => {
            tracing::warn!(command = %name, error = %e, "Dropping command with non UTF-8 payload");
            return false;
        }
    };

    tracing::info!(command = %name, payload = %payload, "Received command");

    match queue.try_send(InboundCommand::new(name, payload)) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(command)) => {
            tracing::warn!(command = %command.name, "Command queue full, dropping command");
            false
        }
        Err(mpsc::error::TrySendError::Closed(command)) => {
            tracing::debug!(command = %command.name, "Command queue closed, dropping command");
            false
        }
    }
}
