//! Host event stream — typed replacement for the host's string-keyed event bus.
//!
//! Events are published when something interesting happens in the host or in
//! the planner. Other components subscribe to react without tight coupling.
//!
//! Payload shapes:
//! - `PluginTriggered`  — a planning run started for `conversation_id`
//! - `GenerationEnded`  — the host finished writing the assistant reply
//! - `ChatChanged`      — the user switched to (or opened) `conversation_id`
//! - `MessageUpdated`   — the message at `index` was rewritten in place
//! - `Notice`           — a user-visible notification

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use crate::message::ConversationId;

/// Severity of a user-visible notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// All events exchanged between the host and the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    PluginTriggered {
        conversation_id: ConversationId,
    },

    GenerationEnded {
        conversation_id: ConversationId,
    },

    ChatChanged {
        conversation_id: ConversationId,
    },

    MessageUpdated {
        conversation_id: ConversationId,
        index: usize,
    },

    Notice {
        level: NoticeLevel,
        title: String,
        message: String,
    },
}

impl HostEvent {
    pub fn notice(level: NoticeLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Notice {
            level,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// A broadcast-based event bus for host events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<HostEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: HostEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<HostEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
