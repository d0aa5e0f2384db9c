//! Event system for link and telemetry notifications.
//!
//! Polling the [`TelemetryStore`](crate::store::TelemetryStore) is the primary
//! way to read results; subscribers here get the same information pushed.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::types::TelemetryRecord;

/// Default event channel capacity.
pub const DEFAULT_CAPACITY: usize = 64;

/// Event types that can be dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Link opened and settled.
    Connected,
    /// Link closed or found dead.
    Disconnected,
    /// Telemetry record published.
    Telemetry(TelemetryRecord),
    /// Device acknowledged a configuration write.
    Acknowledged(String),
}

/// A subscription to events.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receives the next event, skipping any the subscriber lagged behind on.
    ///
    /// Returns `None` once every dispatcher is dropped.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Dispatches events to subscribers.
#[derive(Clone)]
pub struct EventDispatcher {
    sender: Arc<broadcast::Sender<Event>>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventDispatcher {
    /// Creates a new event dispatcher.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Dispatches an event to all subscribers.
    pub fn dispatch(&self, event: Event) {
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribes to events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }
}
