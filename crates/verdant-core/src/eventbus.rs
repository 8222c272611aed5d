//! In-process event bus.
//!
//! Components publish [`EngineEvent`]s and observers subscribe. Built on
//! a broadcast channel: slow subscribers may drop events, publishers
//! never block.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::event::EngineEvent;

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Broadcast event bus for engine events.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

/// Shared handle to an event bus.
pub type SharedEventBus = Arc<EventBus>;

impl EventBus {
    /// Create a new event bus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with the specified capacity.
    ///
    /// The capacity bounds how many events are buffered for slow
    /// subscribers before they start missing events.
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Number of current subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish an event to all subscribers. Returns `true` if at least
    /// one subscriber received it; with no subscribers the event is
    /// discarded.
    pub fn publish(&self, event: EngineEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Subscribe to all events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
