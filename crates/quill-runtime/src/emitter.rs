//! Broadcast-based [`ChatEvent`] dispatch.

use tokio::sync::broadcast;

use quill_core::events::ChatEvent;

/// Default broadcast channel capacity.
const DEFAULT_CAPACITY: usize = 1024;

/// Broadcast-based event emitter.
///
/// Non-blocking: `emit` never awaits, so it is safe to call from progress
/// callbacks and drain tasks. Slow receivers lag and drop events rather
/// than blocking the sender.
pub struct EventEmitter {
    tx: broadcast::Sender<ChatEvent>,
}

impl EventEmitter {
    /// Create an emitter with the default channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create an emitter with a custom channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns the number of receivers that got the event; 0 when nobody
    /// is listening, which is not an error.
    pub fn emit(&self, event: ChatEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to events emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.tx.subscribe()
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}
