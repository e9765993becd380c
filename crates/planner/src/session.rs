//! Chat sessions: the stored conversation plus the live input box.

use std::collections::HashMap;
use std::sync::Arc;

use plotmaster_core::message::{Conversation, ConversationId};
use tokio::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// One open chat as the host presents it.
#[derive(Debug)]
pub struct ChatSession {
    id: ConversationId,
    character: Option<String>,
    conversation: RwLock<Conversation>,
    input: Mutex<String>,
}

impl ChatSession {
    pub fn new(conversation: Conversation) -> Self {
        Self {
            id: conversation.id.clone(),
            character: conversation.character.clone(),
            conversation: RwLock::new(conversation),
            input: Mutex::new(String::new()),
        }
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    /// Avatar of the character card this chat belongs to.
    pub fn character(&self) -> Option<&str> {
        self.character.as_deref()
    }

    pub async fn conversation(&self) -> RwLockReadGuard<'_, Conversation> {
        self.conversation.read().await
    }

    pub async fn conversation_mut(&self) -> RwLockWriteGuard<'_, Conversation> {
        self.conversation.write().await
    }

    /// A copy of the stored conversation.
    pub async fn snapshot(&self) -> Conversation {
        self.conversation().await.clone()
    }

    pub async fn input_text(&self) -> String {
        self.input.lock().await.clone()
    }

    pub async fn set_input(&self, text: impl Into<String>) {
        *self.input.lock().await = text.into();
    }

    /// Clear the input box only if it still holds `expected`.
    pub async fn clear_input_if(&self, expected: &str) -> bool {
        let mut input = self.input.lock().await;
        if *input == expected {
            input.clear();
            true
        } else {
            false
        }
    }
}

/// Open sessions plus the one currently shown to the user.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<ConversationId, Arc<ChatSession>>>,
    active: RwLock<Option<ConversationId>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: Arc<ChatSession>) {
        self.sessions
            .write()
            .await
            .insert(session.id().clone(), session);
    }

    pub async fn get(&self, id: &ConversationId) -> Option<Arc<ChatSession>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Make a registered session the active one.
    pub async fn activate(&self, id: &ConversationId) -> bool {
        if !self.sessions.read().await.contains_key(id) {
            return false;
        }
        *self.active.write().await = Some(id.clone());
        true
    }

    pub async fn active(&self) -> Option<Arc<ChatSession>> {
        let id = self.active.read().await.clone()?;
        self.get(&id).await
    }
}
