//! The direct-call hook: an ordered middleware pipeline in front of the host's
//! generation entry point.
//!
//! ```text
//! GenerationPipeline::generate(options)
//!   → stage 0 .handle(options, next)
//!     → stage 1 .handle(options, next)
//!       → GenerateHandler::generate(options)
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use plotmaster_core::error::Result;
use plotmaster_core::message::Role;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::hooks::lifecycle::GenerationParams;
use crate::planner::{PlanOutcome, Planner};
use crate::session::SessionRegistry;

/// An extension prompt injected into the generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inject {
    pub role: Role,
    pub content: String,
}

/// Arguments of one call to the host's generation entry point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_input: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub injects: Vec<Inject>,

    #[serde(default)]
    pub should_stream: bool,

    /// Set once a stage has planned this call
    #[serde(default)]
    pub processed_by_hook: bool,
}

/// Which argument the user text was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceField {
    Inject,
    UserInput,
    Prompt,
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}

impl GenerateOptions {
    /// The payload the lifecycle hook sees for this call.
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            prompt: self.prompt.clone(),
            processed_by_hook: self.processed_by_hook,
        }
    }

    /// The user text to plan: first inject, else `user_input`, else `prompt`.
    pub fn source_text(&self) -> Option<&str> {
        self.source().map(|(_, text)| text)
    }

    fn source(&self) -> Option<(SourceField, &str)> {
        if let Some(text) = non_blank(self.injects.first().map(|i| i.content.as_str())) {
            return Some((SourceField::Inject, text));
        }
        if let Some(text) = non_blank(self.user_input.as_deref()) {
            return Some((SourceField::UserInput, text));
        }
        non_blank(self.prompt.as_deref()).map(|text| (SourceField::Prompt, text))
    }

    fn write_back(&mut self, field: SourceField, text: String) {
        match field {
            SourceField::Inject => {
                if let Some(inject) = self.injects.first_mut() {
                    inject.content = text;
                }
            }
            SourceField::UserInput => self.user_input = Some(text),
            SourceField::Prompt => self.prompt = Some(text),
        }
    }
}

/// The host's generation entry point; returns the generated text.
#[async_trait]
pub trait GenerateHandler: Send + Sync {
    async fn generate(&self, options: GenerateOptions) -> Result<String>;
}

/// A named interception stage.
#[async_trait]
pub trait GenerationMiddleware: Send + Sync {
    fn name(&self) -> &str;

    /// Inspect or rewrite `options`, then (normally) delegate to `next`.
    async fn handle(&self, options: GenerateOptions, next: Next<'_>) -> Result<String>;
}

/// The remainder of the pipeline after the current stage.
pub struct Next<'a> {
    stages: &'a [Arc<dyn GenerationMiddleware>],
    handler: &'a dyn GenerateHandler,
}

impl Next<'_> {
    pub async fn run(self, options: GenerateOptions) -> Result<String> {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                let next = Next {
                    stages: rest,
                    handler: self.handler,
                };
                stage.handle(options, next).await
            }
            None => self.handler.generate(options).await,
        }
    }
}

/// Stages run in registration order before the wrapped handler.
pub struct GenerationPipeline {
    stages: Vec<Arc<dyn GenerationMiddleware>>,
    handler: Arc<dyn GenerateHandler>,
}

impl GenerationPipeline {
    pub fn new(handler: Arc<dyn GenerateHandler>) -> Self {
        Self {
            stages: Vec::new(),
            handler,
        }
    }

    pub fn with(mut self, stage: Arc<dyn GenerationMiddleware>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub async fn generate(&self, options: GenerateOptions) -> Result<String> {
        let next = Next {
            stages: &self.stages,
            handler: self.handler.as_ref(),
        };
        next.run(options).await
    }
}

/// Plans the user's text before the host generates.
pub struct PlanningStage {
    planner: Arc<Planner>,
    sessions: Arc<SessionRegistry>,
}

impl PlanningStage {
    pub fn new(planner: Arc<Planner>, sessions: Arc<SessionRegistry>) -> Self {
        Self { planner, sessions }
    }

    async fn plan(&self, options: &mut GenerateOptions) -> Option<PlanOutcome> {
        if options.should_stream {
            debug!("Streaming generation, passing through");
            return None;
        }
        if !self.planner.settings().snapshot().enabled {
            return None;
        }
        let Some((field, text)) = options.source().map(|(field, text)| (field, text.to_string())) else {
            debug!("No user text in generation call");
            return None;
        };
        let Some(session) = self.sessions.active().await else {
            debug!("No active chat session, passing through");
            return None;
        };
        let Some(slot) = self.planner.try_begin() else {
            debug!("Planning already in flight, passing through");
            return None;
        };

        let outcome = self.planner.optimize(&slot, &session, &text).await;
        drop(slot);

        if let PlanOutcome::Planned(planned) = &outcome {
            options.write_back(field, planned.message.clone());
            options.processed_by_hook = true;
            debug!(source = ?field, "Generation arguments rewritten");
        }
        Some(outcome)
    }
}

#[async_trait]
impl GenerationMiddleware for PlanningStage {
    fn name(&self) -> &str {
        "plot_planning"
    }

    async fn handle(&self, mut options: GenerateOptions, next: Next<'_>) -> Result<String> {
        self.plan(&mut options).await;
        next.run(options).await
    }
}
