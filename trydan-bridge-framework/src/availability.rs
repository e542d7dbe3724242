//! Retained availability flag.

use std::fmt;

use crate::bus::BusSession;

/// Liveness of the bridge-to-device path as seen by bus subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Availability {
    Online,
    #[default]
    Offline,
}

impl Availability {
    /// Payload published on the availability topic.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owner of the availability state.
///
/// Starts `offline` and only publishes on an actual transition, so repeated
/// calls with the same state never produce duplicate messages.
#[derive(Debug)]
pub struct AvailabilityTracker {
    current: Availability,
    topic: String,
}

impl AvailabilityTracker {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            current: Availability::Offline,
            topic: topic.into(),
        }
    }

    pub fn current(&self) -> Availability {
        self.current
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Record `next` as the current state.
    ///
    /// Returns `true` when this changed the state.
    pub fn transition(&mut self, next: Availability) -> bool {
        if self.current == next {
            return false;
        }
        self.current = next;
        true
    }

    /// Move to `next` and publish it (retained) when the state changed.
    ///
    /// A failed publish is logged; the state still changes, since the broker
    /// will see the transition on the next successful flag anyway.
    pub async fn set<B: BusSession + ?Sized>(&mut self, bus: &B, next: Availability) -> bool {
        if !self.transition(next) {
            return false;
        }

        match bus
            .publish(&self.topic, next.as_str().as_bytes().to_vec(), true)
            .await
        {
            Ok(()) => tracing::info!(topic = %self.topic, availability = %next, "Published availability"),
            Err(e) => tracing::warn!(
                topic = %self.topic,
                availability = %next,
                error = %e,
                "Failed to publish availability"
            ),
        }
        true
    }
}
