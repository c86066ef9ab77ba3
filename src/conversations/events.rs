//! Change notifications emitted by the conversation store.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::core::ids::ConversationId;

/// A mutation that has already been applied to the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    /// A session was created and made current.
    Created {
        /// New session id.
        id: ConversationId,
    },
    /// The current session changed.
    Selected {
        /// Newly selected session id.
        id: ConversationId,
    },
    /// A session was removed.
    Deleted {
        /// Removed session id.
        id: ConversationId,
        /// Whether the removed session was the current one (current is now cleared).
        was_current: bool,
    },
    /// Every session was removed.
    Cleared {
        /// Number of sessions removed.
        removed: usize,
    },
    /// A message was appended to a session.
    MessageRecorded {
        /// Session id.
        id: ConversationId,
        /// Message count after the append.
        message_count: u32,
    },
    /// A session title changed.
    Renamed {
        /// Session id.
        id: ConversationId,
        /// New title.
        title: String,
    },
}

/// Receiving half handed to observers.
pub type StoreEventReceiver = broadcast::Receiver<StoreEvent>;

/// Fan-out channel for store events.
///
/// Emitting without subscribers is not an error. Subscribers that fall behind
/// the channel capacity observe `Lagged` and should re-read a snapshot.
#[derive(Clone, Debug)]
pub struct StoreEventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl StoreEventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn emit(&self, event: StoreEvent) {
        let _ = self.sender.send(event);
    }

    /// Register a new observer.
    #[must_use]
    pub fn subscribe(&self) -> StoreEventReceiver {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers() {
        let bus = StoreEventBus::new(4);
        bus.emit(StoreEvent::Cleared { removed: 0 });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_every_subscriber_receives() {
        let bus = StoreEventBus::new(4);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        let id = ConversationId::new();

        bus.emit(StoreEvent::Created { id });

        assert_eq!(rx1.try_recv().ok(), Some(StoreEvent::Created { id }));
        assert_eq!(rx2.try_recv().ok(), Some(StoreEvent::Created { id }));
    }

    #[test]
    fn test_event_serialization_tag() {
        let json = serde_json::to_value(StoreEvent::Cleared { removed: 3 }).unwrap_or_default();
        assert_eq!(json["type"], "cleared");
        assert_eq!(json["removed"], 3);
    }
}
