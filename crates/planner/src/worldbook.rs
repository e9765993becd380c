//! A keyword-activated worldbook loaded from JSON.

use std::path::Path;

use async_trait::async_trait;
use plotmaster_core::error::HostError;
use plotmaster_core::host::WorldbookSource;
use plotmaster_core::message::Conversation;
use serde::{Deserialize, Serialize};

const DEFAULT_SCAN_DEPTH: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldbookEntry {
    pub uid: u64,

    #[serde(default)]
    pub comment: String,

    #[serde(default)]
    pub keys: Vec<String>,

    #[serde(default)]
    pub content: String,

    /// Always included, regardless of keys
    #[serde(default)]
    pub constant: bool,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticWorldbook {
    #[serde(default)]
    pub entries: Vec<WorldbookEntry>,

    /// How many trailing chat messages are scanned for keys
    #[serde(default = "default_scan_depth")]
    pub scan_depth: usize,
}

fn default_scan_depth() -> usize {
    DEFAULT_SCAN_DEPTH
}

impl StaticWorldbook {
    pub fn new(entries: Vec<WorldbookEntry>) -> Self {
        Self {
            entries,
            scan_depth: DEFAULT_SCAN_DEPTH,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, HostError> {
        serde_json::from_str(json).map_err(|e| HostError::InvalidPayload(format!("worldbook: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self, HostError> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| HostError::Unavailable(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// Active entry contents for a scan text, joined with blank lines in uid order.
    pub fn activate(&self, scan_text: &str) -> String {
        let haystack = scan_text.to_lowercase();

        let mut active: Vec<&WorldbookEntry> = self
            .entries
            .iter()
            .filter(|e| e.enabled && !e.content.trim().is_empty())
            .filter(|e| {
                e.constant
                    || e.keys
                        .iter()
                        .map(|k| k.trim())
                        .filter(|k| !k.is_empty())
                        .any(|k| haystack.contains(&k.to_lowercase()))
            })
            .collect();
        active.sort_by_key(|e| e.uid);

        tracing::debug!(active = active.len(), total = self.entries.len(), "Worldbook scan");

        active
            .iter()
            .map(|e| e.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[async_trait]
impl WorldbookSource for StaticWorldbook {
    async fn combined_content(
        &self,
        conversation: &Conversation,
        user_message: &str,
    ) -> Result<String, HostError> {
        let start = conversation.messages.len().saturating_sub(self.scan_depth);
        let mut scan = String::from(user_message);
        for message in &conversation.messages[start..] {
            scan.push('\n');
            scan.push_str(&message.content);
        }
        Ok(self.activate(&scan))
    }
}
