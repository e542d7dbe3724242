//! In-process bus session.
//!
//! [`MemoryBus`] records every publish and lets callers inject inbound
//! messages as if they came from a broker. Clones share state, so a test can
//! keep one handle while the controller owns another.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use trydan_common::TopicBuilder;

use crate::bus::{BusChannels, BusSession, InboundCommand, enqueue_command};
use crate::error::{ConnectError, PublishError};

/// A message recorded by [`MemoryBus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

impl PublishedMessage {
    /// Payload as UTF-8 text (lossy).
    pub fn payload_str(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

#[derive(Debug, Default)]
struct MemoryBusState {
    published: Vec<PublishedMessage>,
    subscriptions: Vec<String>,
    commands: Option<mpsc::Sender<InboundCommand>>,
    connected: Option<watch::Sender<bool>>,
    connect_calls: usize,
    disconnect_calls: usize,
    refuse_connect: bool,
    fail_publish: bool,
}

/// In-memory implementation of [`BusSession`].
#[derive(Debug, Clone)]
pub struct MemoryBus {
    topics: TopicBuilder,
    queue_capacity: usize,
    state: Arc<Mutex<MemoryBusState>>,
}

impl MemoryBus {
    pub fn new(topics: TopicBuilder) -> Self {
        Self {
            topics,
            queue_capacity: 64,
            state: Arc::new(Mutex::new(MemoryBusState::default())),
        }
    }

    /// Make every later `connect` fail, like an unreachable broker.
    pub fn refuse_connections(&self) {
        self.lock().refuse_connect = true;
    }

    /// Make publishes fail (`true`) or succeed again (`false`).
    pub fn fail_publishes(&self, fail: bool) {
        self.lock().fail_publish = fail;
    }

    /// Simulate a broker message arriving on `topic`.
    ///
    /// Goes through the same parsing and queueing as the MQTT transport.
    /// Returns `true` when a command was queued.
    pub fn inject(&self, topic: &str, payload: &[u8]) -> bool {
        let queue = self.lock().commands.clone();
        match queue {
            Some(queue) => enqueue_command(&self.topics, &queue, topic, payload),
            None => false,
        }
    }

    /// Simulate the broker connection dropping (`false`) or coming back (`true`).
    pub fn set_connected(&self, connected: bool) {
        if let Some(state) = &self.lock().connected {
            state.send_replace(connected);
        }
    }

    /// Drop the sending side of the command queue, as a dead transport would.
    pub fn close_command_queue(&self) {
        self.lock().commands = None;
    }

    /// Every message published so far, in order.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.lock().published.clone()
    }

    /// Messages published to one topic, in order.
    pub fn published_to(&self, topic: &str) -> Vec<PublishedMessage> {
        self.lock()
            .published
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Subscriptions made by `connect`.
    pub fn subscriptions(&self) -> Vec<String> {
        self.lock().subscriptions.clone()
    }

    pub fn connect_calls(&self) -> usize {
        self.lock().connect_calls
    }

    pub fn disconnect_calls(&self) -> usize {
        self.lock().disconnect_calls
    }

    fn lock(&self) -> MutexGuard<'_, MemoryBusState> {
        // A poisoned lock only means a test thread panicked; keep the records
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl BusSession for MemoryBus {
    async fn connect(&mut self) -> Result<BusChannels, ConnectError> {
        let mut state = self.lock();
        state.connect_calls += 1;

        if state.refuse_connect {
            return Err(ConnectError::Unreachable {
                endpoint: "memory".to_string(),
                message: "connection refused".to_string(),
            });
        }

        let (command_tx, command_rx) = mpsc::channel(self.queue_capacity);
        let (connected_tx, connected_rx) = watch::channel(true);

        state.subscriptions.push(self.topics.command_filter());
        state.commands = Some(command_tx);
        state.connected = Some(connected_tx);

        Ok(BusChannels {
            commands: command_rx,
            connected: connected_rx,
        })
    }

    async fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        retain: bool,
    ) -> Result<(), PublishError> {
        let mut state = self.lock();

        if state.fail_publish {
            return Err(PublishError::Send {
                topic: topic.to_string(),
                message: "publish refused".to_string(),
            });
        }

        state.published.push(PublishedMessage {
            topic: topic.to_string(),
            payload,
            retain,
        });
        Ok(())
    }

    async fn disconnect(&mut self) {
        let mut state = self.lock();
        state.disconnect_calls += 1;
        state.commands = None;
        state.connected = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_bus_records_publishes() {
        let bus = MemoryBus::new(TopicBuilder::new("trydan"));
        let mut session = bus.clone();

        let channels = session.connect().await.unwrap();
        assert!(*channels.connected.borrow());
        assert_eq!(bus.subscriptions(), vec!["trydan/command/+".to_string()]);

        session
            .publish("trydan/availability", b"online".to_vec(), true)
            .await
            .unwrap();

        let published = bus.published_to("trydan/availability");
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].payload_str(), "online");
        assert!(published[0].retain);
    }

    #[tokio::test]
    async fn test_memory_bus_inject() {
        let bus = MemoryBus::new(TopicBuilder::new("trydan"));
        assert!(!bus.inject("trydan/command/pause", b""));

        let mut session = bus.clone();
        let mut channels = session.connect().await.unwrap();

        assert!(bus.inject("trydan/command/set_charge_current", b"16"));
        let command = channels.commands.recv().await.unwrap();
        assert_eq!(command.name, "set_charge_current");
        assert_eq!(command.payload, "16");

        session.disconnect().await;
        assert!(channels.commands.recv().await.is_none());
        assert_eq!(bus.disconnect_calls(), 1);
    }

    #[tokio::test]
    async fn test_memory_bus_failures() {
        let bus = MemoryBus::new(TopicBuilder::new("trydan"));
        let mut session = bus.clone();

        bus.refuse_connections();
        assert!(session.connect().await.is_err());
        assert_eq!(bus.connect_calls(), 1);

        bus.fail_publishes(true);
        assert!(session.publish("trydan/data", Vec::new(), true).await.is_err());
        assert!(bus.published().is_empty());
    }
}
