//! Character-card store backed by the host's HTTP API.
//!
//! Reads call `POST /api/characters/get` with the avatar file name; writes
//! call `POST /api/characters/merge-attributes` with the extension's blob
//! nested under `data.extensions.<extension>`.

use async_trait::async_trait;
use plotmaster_config::EXTENSION_NAME;
use plotmaster_core::error::HostError;
use plotmaster_core::host::CharacterStore;
use tracing::{debug, warn};

pub struct HttpCharacterStore {
    base_url: String,
    headers: reqwest::header::HeaderMap,
    client: reqwest::Client,
}

impl HttpCharacterStore {
    /// `base_url` is the host root, e.g. `http://127.0.0.1:8000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            headers: reqwest::header::HeaderMap::new(),
            client,
        }
    }

    /// Send the host's CSRF token with every request.
    pub fn with_csrf_token(mut self, token: &str) -> Result<Self, HostError> {
        let value = reqwest::header::HeaderValue::from_str(token)
            .map_err(|e| HostError::InvalidPayload(format!("invalid CSRF token: {e}")))?;
        self.headers.insert("X-CSRF-Token", value);
        Ok(self)
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response, HostError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .headers(self.headers.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| HostError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let reason = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), path, "Host API call failed");
            return Err(HostError::RequestFailed {
                status_code: status.as_u16(),
                reason,
            });
        }
        Ok(response)
    }
}

/// Build the merge-attributes payload for one character.
fn merge_payload(character: &str, data: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "avatar": character,
        "data": { "extensions": { EXTENSION_NAME: data } },
    })
}

/// Pull the extension blob out of a full character card.
fn extract_blob(card: &serde_json::Value) -> Option<serde_json::Value> {
    card.pointer("/data/extensions")?
        .get(EXTENSION_NAME)
        .cloned()
}

#[async_trait]
impl CharacterStore for HttpCharacterStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn extension_data(&self, character: &str) -> Result<Option<serde_json::Value>, HostError> {
        let response = self
            .post("/api/characters/get", serde_json::json!({ "avatar_url": character }))
            .await?;
        let card: serde_json::Value = response
            .json()
            .await
            .map_err(|e| HostError::InvalidPayload(e.to_string()))?;
        Ok(extract_blob(&card))
    }

    async fn merge_extension_data(&self, character: &str, data: serde_json::Value) -> Result<(), HostError> {
        self.post("/api/characters/merge-attributes", merge_payload(character, data))
            .await?;
        debug!(character, "Character card updated");
        Ok(())
    }
}
