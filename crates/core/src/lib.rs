//! # plotmaster core
//!
//! Domain types, traits, and error definitions for the plotmaster plot-planning
//! pipeline. This crate has **no framework dependencies**; it defines the
//! domain model that the other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator outside the pipeline (the LLM backend, the host's
//! character cards, the memory-table export, the worldbook) is a trait here.
//! Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with scripted/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod event;
pub mod host;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use error::{Error, HostError, ProviderError, Result};
pub use event::{EventBus, HostEvent, NoticeLevel};
pub use host::{CharacterStore, InMemoryCharacterStore, StaticTables, TableSource, WorldbookSource};
pub use message::{Conversation, ConversationId, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
