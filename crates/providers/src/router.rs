//! Provider router — selects the completion backend for a planning run.
//!
//! The API settings may change between runs (UI edits, presets, character
//! overrides), so selection happens per run from the resolved settings.

use std::sync::Arc;
use plotmaster_config::{ApiMode, ApiSettings};
use plotmaster_core::error::ProviderError;
use plotmaster_core::provider::Provider;
use crate::openai_compat::OpenAiCompatProvider;

/// Routes planning requests to the correct provider.
#[derive(Default, Clone)]
pub struct ProviderRouter {
    /// The host's own generation backend, used in `tavern` mode
    host: Option<Arc<dyn Provider>>,

    /// A fixed provider that wins over any settings-based choice
    fixed: Option<Arc<dyn Provider>>,
}

impl ProviderRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the host's built-in generation backend.
    pub fn with_host(mut self, provider: Arc<dyn Provider>) -> Self {
        self.host = Some(provider);
        self
    }

    /// Always answer with `provider`, regardless of settings.
    pub fn with_fixed(mut self, provider: Arc<dyn Provider>) -> Self {
        self.fixed = Some(provider);
        self
    }

    /// Pick the provider for these settings.
    pub fn select(&self, api: &ApiSettings) -> Result<Arc<dyn Provider>, ProviderError> {
        if let Some(fixed) = &self.fixed {
            return Ok(fixed.clone());
        }

        match api.api_mode {
            ApiMode::Tavern => self.host.clone().ok_or_else(|| {
                ProviderError::NotConfigured("tavern mode selected but no host backend is registered".into())
            }),
            ApiMode::OpenAi => {
                if api.api_url.trim().is_empty() {
                    return Err(ProviderError::NotConfigured("apiUrl is empty".into()));
                }
                Ok(Arc::new(OpenAiCompatProvider::new(
                    "openai",
                    &api.api_url,
                    api.api_key.clone().unwrap_or_default(),
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use plotmaster_core::message::Message;
    use plotmaster_core::provider::{ProviderRequest, ProviderResponse};

    struct Named(&'static str);

    #[async_trait]
    impl Provider for Named {
        fn name(&self) -> &str {
            self.0
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse {
                message: Message::assistant(self.0),
                usage: None,
                model: "mock".into(),
                metadata: serde_json::Map::new(),
            })
        }
    }

    #[test]
    fn openai_mode_requires_url() {
        let router = ProviderRouter::new();
        let mut api = ApiSettings::default();
        assert!(matches!(router.select(&api), Err(ProviderError::NotConfigured(_))));

        api.api_url = "http://localhost:5000/v1".into();
        assert_eq!(router.select(&api).unwrap().name(), "openai");
    }

    #[test]
    fn tavern_mode_uses_host_backend() {
        let mut api = ApiSettings::default();
        api.api_mode = ApiMode::Tavern;

        assert!(ProviderRouter::new().select(&api).is_err());

        let router = ProviderRouter::new().with_host(Arc::new(Named("tavern")));
        assert_eq!(router.select(&api).unwrap().name(), "tavern");
    }

    #[test]
    fn fixed_provider_wins() {
        let router = ProviderRouter::new()
            .with_host(Arc::new(Named("tavern")))
            .with_fixed(Arc::new(Named("fixed")));
        let mut api = ApiSettings::default();
        api.api_mode = ApiMode::Tavern;
        assert_eq!(router.select(&api).unwrap().name(), "fixed");
    }
}
