//! Pending plot handoff between a planning run and the end of generation.

use std::collections::HashMap;
use std::sync::Mutex;

use plotmaster_core::message::ConversationId;

/// Raw planning responses waiting to be attached to the next assistant turn,
/// keyed by conversation. Each value is consumed at most once.
#[derive(Debug, Default)]
pub struct PlotHandoff {
    pending: Mutex<HashMap<ConversationId, String>>,
}

impl PlotHandoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the plot for a conversation, replacing anything unconsumed.
    pub fn stash(&self, conversation: &ConversationId, plot: impl Into<String>) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if pending.insert(conversation.clone(), plot.into()).is_some() {
            tracing::debug!(conversation = %conversation, "Replaced unconsumed plot");
        }
    }

    /// Remove and return the pending plot, if any.
    pub fn take(&self, conversation: &ConversationId) -> Option<String> {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(conversation)
    }

    pub fn is_pending(&self, conversation: &ConversationId) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(conversation)
    }
}
