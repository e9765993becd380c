//! Context extraction from the chat history.

use plotmaster_core::message::{Conversation, Message, Role};

/// The trailing `count` assistant turns, oldest first, re-emitted as fresh
/// assistant messages. `count <= 0` yields nothing.
pub fn recent_assistant_turns(conversation: &Conversation, count: i64) -> Vec<Message> {
    let Ok(count) = usize::try_from(count) else {
        return Vec::new();
    };

    let assistant: Vec<&Message> = conversation
        .messages
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .collect();

    let start = assistant.len().saturating_sub(count);
    assistant[start..]
        .iter()
        .map(|m| Message::assistant(m.content.clone()))
        .collect()
}

/// The most recent plot artifact stored in the history, or `""`.
pub fn last_plot(conversation: &Conversation) -> String {
    conversation
        .messages
        .iter()
        .enumerate()
        .rev()
        .find_map(|(index, m)| {
            let plot = m.plot.as_deref().filter(|p| !p.is_empty())?;
            tracing::debug!(index, "Found previous plot");
            Some(plot.to_string())
        })
        .unwrap_or_default()
}
