//! Snapshot publisher for MQTT.

use trydan_common::{Snapshot, TopicBuilder, encode, field_payload};

use crate::bus::BusSession;
use crate::error::PublishError;

/// One message ready to hand to the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub retain: bool,
}

/// Turns snapshots into the per-field and aggregate telemetry messages.
///
/// Each field goes to `<prefix>/sensor/<field>` as its plain string form and
/// the whole snapshot (timestamp included) goes to `<prefix>/data` as JSON.
/// Everything is retained.
#[derive(Clone, Debug)]
pub struct SnapshotPublisher {
    topics: TopicBuilder,
}

impl SnapshotPublisher {
    pub fn new(topics: TopicBuilder) -> Self {
        Self { topics }
    }

    pub fn topics(&self) -> &TopicBuilder {
        &self.topics
    }

    /// Build the messages for one snapshot, per-field topics first.
    pub fn messages(&self, snapshot: &Snapshot) -> Result<Vec<OutboundMessage>, PublishError> {
        let mut messages: Vec<OutboundMessage> = snapshot
            .fields()
            .map(|(name, value)| OutboundMessage {
                topic: self.topics.sensor(name),
                payload: field_payload(value),
                retain: true,
            })
            .collect();

        let data = encode(snapshot).map_err(|e| PublishError::Serialization(e.to_string()))?;
        messages.push(OutboundMessage {
            topic: self.topics.data(),
            payload: data,
            retain: true,
        });

        Ok(messages)
    }

    /// Publish one snapshot.
    ///
    /// A failed message does not stop the rest. Failures are counted and
    /// reported in one warning per snapshot.
    pub async fn publish<B: BusSession + ?Sized>(&self, bus: &B, snapshot: &Snapshot) -> PublishStats {
        let mut stats = PublishStats::default();

        let messages = match self.messages(snapshot) {
            Ok(messages) => messages,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode snapshot");
                stats.failed += 1;
                return stats;
            }
        };

        let mut last_error = None;
        for message in messages {
            match bus.publish(&message.topic, message.payload, message.retain).await {
                Ok(()) => stats.success += 1,
                Err(e) => {
                    stats.failed += 1;
                    tracing::debug!(error = %e, "Failed to publish telemetry message");
                    last_error = Some(e);
                }
            }
        }

        if let Some(e) = last_error {
            tracing::warn!(
                failed = stats.failed,
                total = stats.total(),
                error = %e,
                "Failed to publish telemetry"
            );
        }

        stats
    }
}

/// Statistics from publishing one snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct PublishStats {
    /// Number of successfully published messages.
    pub success: usize,
    /// Number of failed publishes.
    pub failed: usize,
}

impl PublishStats {
    /// Total number of attempted publishes.
    pub fn total(&self) -> usize {
        self.success + self.failed
    }
}
