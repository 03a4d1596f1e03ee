//! Typed events
//!
//! Ledger and swap state changes are published on a broadcast channel so callers (chat
//! controllers, UI routers) can react without polling.

use rdk_common::TxHash;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::swap::SwapStatus;

/// Default channel capacity
pub const DEFAULT_CHANNEL_SIZE: usize = 64;

/// Event published by the core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A user started an action
    ActionStarted {
        /// User id
        user_id: String,
        /// Action id
        action_id: String,
    },
    /// A user completed an action and rewards were issued
    ActionCompleted {
        /// User id
        user_id: String,
        /// Action id
        action_id: String,
        /// Issued rewards
        reward_ids: Vec<Uuid>,
    },
    /// A reward was claimed
    RewardClaimed {
        /// User id
        user_id: String,
        /// Reward id
        reward_id: Uuid,
    },
    /// A swap moved to a new status
    SwapStatusChanged {
        /// New status
        status: SwapStatus,
        /// Transaction hash, once submitted
        tx_hash: Option<TxHash>,
    },
}

/// Broadcast bus for [`Event`]s
///
/// Publishing never fails: with no subscribers the event is dropped.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_SIZE)
    }
}

impl EventBus {
    /// Create new [`EventBus`]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event
    pub fn publish(&self, event: Event) {
        if self.sender.send(event).is_err() {
            tracing::trace!("No event subscribers");
        }
    }

    /// Subscribe to future events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_and_subscribe() {
        let bus = EventBus::default();
        bus.publish(Event::ActionStarted {
            user_id: "nobody".into(),
            action_id: "a".into(),
        });

        let mut receiver = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let event = Event::RewardClaimed {
            user_id: "alice".into(),
            reward_id: Uuid::nil(),
        };
        bus.publish(event.clone());

        assert_eq!(receiver.recv().await.unwrap(), event);
    }

    #[test]
    fn test_event_json() {
        let event = Event::ActionStarted {
            user_id: "alice".into(),
            action_id: "get-cusd".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "action_started");
        assert_eq!(json["action_id"], "get-cusd");
    }
}
