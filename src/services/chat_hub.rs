//! Real-time chat event hub.
//!
//! Services publish events addressed to a set of users; every websocket
//! connection subscribes and forwards only the events addressed to its user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use crate::models::MessageDto;

/// Channel capacity for chat events.
const CHANNEL_CAPACITY: usize = 1000;

/// Read receipt pushed to a message's sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceipt {
    pub message_id: String,
    pub conversation_id: String,
    pub user_id: String,
    pub read_at: DateTime<Utc>,
}

/// Event pushed over the websocket as `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "message.created")]
    MessageCreated(MessageDto),
    #[serde(rename = "message.updated")]
    MessageUpdated(MessageDto),
    #[serde(rename = "message.deleted")]
    MessageDeleted(MessageDto),
    #[serde(rename = "message.read")]
    MessageRead(ReadReceipt),
}

impl ServerEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ServerEvent::MessageCreated(_) => "message.created",
            ServerEvent::MessageUpdated(_) => "message.updated",
            ServerEvent::MessageDeleted(_) => "message.deleted",
            ServerEvent::MessageRead(_) => "message.read",
        }
    }
}

/// An event and the users it is addressed to.
#[derive(Debug, Clone)]
pub struct ChatEvent {
    pub recipients: Vec<String>,
    pub event: ServerEvent,
}

impl ChatEvent {
    pub fn is_for(&self, user_id: &str) -> bool {
        self.recipients.iter().any(|r| r == user_id)
    }
}

/// Broadcast hub shared by services and websocket connections.
#[derive(Clone)]
pub struct ChatHub {
    sender: broadcast::Sender<ChatEvent>,
}

impl ChatHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish an event. Dropped silently when nobody is connected.
    pub fn publish(&self, recipients: Vec<String>, event: ServerEvent) {
        trace!(
            event_type = event.event_type(),
            recipients = recipients.len(),
            "Publishing chat event"
        );
        let _ = self.sender.send(ChatEvent { recipients, event });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChatHub {
    fn default() -> Self {
        Self::new()
    }
}
