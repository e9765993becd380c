//! Host-side collaborators — traits over what the planner borrows from the
//! chat application and its plugins.
//!
//! - [`CharacterStore`]: per-character extension data (override blobs)
//! - [`TableSource`]: the memory-table plugin's JSON export
//! - [`WorldbookSource`]: lore text relevant to the current turn

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use crate::error::HostError;
use crate::message::Conversation;

/// Access to the extension data stored on character cards.
///
/// Blobs are the extension's own sub-object of the card
/// (`data.extensions.<extension>`), opaque JSON to the host.
#[async_trait]
pub trait CharacterStore: Send + Sync {
    /// The store name (e.g., "http", "in_memory").
    fn name(&self) -> &str;

    /// Read the extension blob stored on a character card.
    async fn extension_data(
        &self,
        character: &str,
    ) -> std::result::Result<Option<serde_json::Value>, HostError>;

    /// Persist the extension blob on a character card.
    async fn merge_extension_data(
        &self,
        character: &str,
        data: serde_json::Value,
    ) -> std::result::Result<(), HostError>;
}

/// The memory-table plugin's export (`sheetId -> { name, content }`).
pub trait TableSource: Send + Sync {
    fn export_tables(&self) -> std::result::Result<serde_json::Value, HostError>;
}

/// Worldbook (lore book) lookup for the current turn.
#[async_trait]
pub trait WorldbookSource: Send + Sync {
    async fn combined_content(
        &self,
        conversation: &Conversation,
        user_message: &str,
    ) -> std::result::Result<String, HostError>;
}

/// Character store kept in memory, used by tests and the CLI.
pub struct InMemoryCharacterStore {
    cards: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}

impl InMemoryCharacterStore {
    pub fn new() -> Self {
        Self {
            cards: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Build a store from a JSON object of `character -> blob`.
    pub fn from_value(value: serde_json::Value) -> std::result::Result<Self, HostError> {
        let serde_json::Value::Object(map) = value else {
            return Err(HostError::InvalidPayload(
                "character store document must be a JSON object".into(),
            ));
        };
        Ok(Self {
            cards: Arc::new(RwLock::new(map.into_iter().collect())),
        })
    }

    /// Export every card as a JSON object.
    pub async fn to_value(&self) -> serde_json::Value {
        let cards = self.cards.read().await;
        serde_json::Value::Object(
            cards
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl Default for InMemoryCharacterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CharacterStore for InMemoryCharacterStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn extension_data(
        &self,
        character: &str,
    ) -> std::result::Result<Option<serde_json::Value>, HostError> {
        Ok(self.cards.read().await.get(character).cloned())
    }

    /// Overwrites the stored blob; callers always pass the complete blob.
    async fn merge_extension_data(
        &self,
        character: &str,
        data: serde_json::Value,
    ) -> std::result::Result<(), HostError> {
        self.cards.write().await.insert(character.to_string(), data);
        Ok(())
    }
}

/// A fixed table export, e.g. loaded from a file.
pub struct StaticTables {
    export: serde_json::Value,
}

impl StaticTables {
    pub fn new(export: serde_json::Value) -> Self {
        Self { export }
    }
}

impl TableSource for StaticTables {
    fn export_tables(&self) -> std::result::Result<serde_json::Value, HostError> {
        Ok(self.export.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn in_memory_store_roundtrip() {
        let store = InMemoryCharacterStore::new();
        assert!(store.extension_data("alice").await.unwrap().is_none());

        store
            .merge_extension_data("alice", json!({"apiSettings": {"rateMain": 2}}))
            .await
            .unwrap();

        let blob = store.extension_data("alice").await.unwrap().unwrap();
        assert_eq!(blob["apiSettings"]["rateMain"], 2);
    }

    #[tokio::test]
    async fn in_memory_store_overwrites_previous_blob() {
        let store = InMemoryCharacterStore::new();
        store
            .merge_extension_data("alice", json!({"apiSettings": {"rateMain": 2, "apiUrl": "x"}}))
            .await
            .unwrap();
        store
            .merge_extension_data("alice", json!({"apiSettings": {"apiUrl": "x"}}))
            .await
            .unwrap();

        let blob = store.extension_data("alice").await.unwrap().unwrap();
        assert_eq!(blob, json!({"apiSettings": {"apiUrl": "x"}}));
    }

    #[test]
    fn from_value_rejects_non_objects() {
        assert!(InMemoryCharacterStore::from_value(json!([1, 2])).is_err());
        assert!(InMemoryCharacterStore::from_value(json!({"bob": {}})).is_ok());
    }

    #[test]
    fn static_tables_returns_export() {
        let tables = StaticTables::new(json!({"s1": {"name": "Items"}}));
        assert_eq!(tables.export_tables().unwrap()["s1"]["name"], "Items");
    }
}
