//! Shared test helpers for planner tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use plotmaster_config::Settings;
use plotmaster_core::error::ProviderError;
use plotmaster_core::message::Message;
use plotmaster_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use tokio::sync::{Notify, Semaphore};

/// A mock provider that answers from a script, one reply per call.
///
/// Records every request. Panics if more calls are made than replies provided.
/// With a gate attached, each call waits for a permit after being recorded.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    gate: Option<Arc<Semaphore>>,
    entered: Arc<Notify>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<&str>) -> Self {
        Self::with_results(replies.into_iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn with_results(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            gate: None,
            entered: Arc::new(Notify::new()),
        }
    }

    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Notified each time a call starts.
    pub fn entered(&self) -> Arc<Notify> {
        self.entered.clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        self.entered.notify_one();

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedProvider: no more replies (call #{call})"));
        reply.map(|text| make_text_response(&text))
    }
}

pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "mock-model".into(),
        metadata: serde_json::Map::new(),
    }
}

/// Enabled settings pointing at a dummy URL.
pub fn enabled_settings(min_length: u32) -> Settings {
    let mut settings = Settings::default();
    settings.enabled = true;
    settings.min_length = min_length;
    settings.api_settings.api_url = "http://llm.test/v1".into();
    settings
}
