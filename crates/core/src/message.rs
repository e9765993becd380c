//! Message and Conversation domain types.
//!
//! These are the value objects the planning pipeline reads from and writes
//! back into: the user sends a message → a hook intercepts it → the planner
//! rewrites it → the stored message and the outgoing request are updated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation (chat).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant (the character)
    Assistant,
    /// System instructions
    System,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    #[serde(default = "new_message_id")]
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Plot artifact attached after a planned generation finished
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot: Option<String>,

    /// Set once the lifecycle hook has looked at this user turn
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub processed: bool,

    /// Optional metadata (host-specific fields)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            plot: None,
            processed: false,
            metadata: serde_json::Map::new(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Attach a plot artifact (builder style, mostly for fixtures).
    pub fn with_plot(mut self, plot: impl Into<String>) -> Self {
        self.plot = Some(plot.into());
        self
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

/// A conversation is an ordered sequence of messages with shared context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    #[serde(default)]
    pub id: ConversationId,

    /// Ordered messages
    #[serde(default)]
    pub messages: Vec<Message>,

    /// When this conversation was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// When the last message was added or rewritten
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,

    /// The character card this chat belongs to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,

    /// Conversation-level metadata
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            character: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// Create a new empty conversation bound to a character card.
    pub fn for_character(character: impl Into<String>) -> Self {
        Self {
            character: Some(character.into()),
            ..Self::new()
        }
    }

    /// Add a message to the conversation.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn last_mut(&mut self) -> Option<&mut Message> {
        self.messages.last_mut()
    }

    /// Locate a message by ID, returning its index alongside it.
    pub fn find_mut(&mut self, id: &str) -> Option<(usize, &mut Message)> {
        self.messages
            .iter_mut()
            .enumerate()
            .find(|(_, m)| m.id == id)
    }

    /// Mark the conversation as modified.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
