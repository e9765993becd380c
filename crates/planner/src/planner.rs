//! The planning orchestrator.
//!
//! One run: resolve settings → gather context → substitute templates → call
//! the completion backend (with length-gated retries) → stash the raw plot →
//! splice the (optionally tag-filtered) plot into the user's message.
//!
//! At most one run is in flight per planner. The in-flight slot is a
//! single-permit semaphore; a trigger that cannot take it is dropped.

use std::sync::Arc;
use std::time::Duration;

use plotmaster_config::{ApiSettingsOverride, Settings, SettingsHandle};
use plotmaster_core::error::Result;
use plotmaster_core::event::{EventBus, HostEvent, NoticeLevel};
use plotmaster_core::host::{CharacterStore, TableSource, WorldbookSource};
use plotmaster_core::provider::{Provider, ProviderRequest};
use plotmaster_providers::ProviderRouter;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::context::{last_plot, recent_assistant_turns};
use crate::extract::{extract_tagged, parse_tag_list};
use crate::handoff::PlotHandoff;
use crate::placeholder::ReplacementMap;
use crate::request::{build_planning_request, compose_final_message};
use crate::session::ChatSession;
use crate::tables::table_text;

const NOTICE_TITLE: &str = "Plot planner";
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Proof that the caller holds the in-flight slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct PlanSlot {
    _permit: OwnedSemaphorePermit,
}

/// A successful planning run.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedMessage {
    /// The user's text with the directive and plot spliced in
    pub message: String,

    /// The full raw response, as stashed for the next assistant turn
    pub plot: String,

    /// What was actually spliced in (the tag-filtered fragments, or `plot`)
    pub injected: String,

    /// Which attempt produced the accepted response (1-based)
    pub attempts: u32,

    /// Whether tag extraction replaced the full response
    pub extracted_tags: bool,
}

/// How a planning trigger ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    Planned(PlannedMessage),

    /// Disabled or no backend configured; nothing happened
    Skipped,

    /// Another run holds the in-flight slot; the trigger was dropped
    Busy,

    /// Single-shot mode got an empty response
    Empty,

    /// No attempt met the minimum length
    Exhausted { attempts: u32 },

    /// Any error while gathering context or calling the backend
    Failed { reason: String },
}

impl PlanOutcome {
    pub fn planned(&self) -> Option<&PlannedMessage> {
        match self {
            Self::Planned(planned) => Some(planned),
            _ => None,
        }
    }

    pub fn is_planned(&self) -> bool {
        matches!(self, Self::Planned(_))
    }
}

pub struct Planner {
    settings: SettingsHandle,
    router: ProviderRouter,
    characters: Option<Arc<dyn CharacterStore>>,
    tables: Option<Arc<dyn TableSource>>,
    worldbook: Option<Arc<dyn WorldbookSource>>,
    events: Arc<EventBus>,
    handoff: PlotHandoff,
    slot: Arc<Semaphore>,
    retry_delay: Duration,
    max_attempts: u32,
}

impl Planner {
    pub fn new(settings: SettingsHandle, events: Arc<EventBus>) -> Self {
        Self {
            settings,
            router: ProviderRouter::new(),
            characters: None,
            tables: None,
            worldbook: None,
            events,
            handoff: PlotHandoff::new(),
            slot: Arc::new(Semaphore::new(1)),
            retry_delay: DEFAULT_RETRY_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_router(mut self, router: ProviderRouter) -> Self {
        self.router = router;
        self
    }

    /// Always plan with `provider`, whatever the API mode says.
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.router = self.router.with_fixed(provider);
        self
    }

    /// Register the host's built-in backend for `tavern` mode.
    pub fn with_host_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.router = self.router.with_host(provider);
        self
    }

    pub fn with_character_store(mut self, store: Arc<dyn CharacterStore>) -> Self {
        self.characters = Some(store);
        self
    }

    pub fn with_tables(mut self, tables: Arc<dyn TableSource>) -> Self {
        self.tables = Some(tables);
        self
    }

    pub fn with_worldbook(mut self, worldbook: Arc<dyn WorldbookSource>) -> Self {
        self.worldbook = Some(worldbook);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn handoff(&self) -> &PlotHandoff {
        &self.handoff
    }

    pub(crate) fn character_store(&self) -> Option<&Arc<dyn CharacterStore>> {
        self.characters.as_ref()
    }

    /// Take the in-flight slot without waiting.
    pub fn try_begin(&self) -> Option<PlanSlot> {
        self.slot
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| PlanSlot { _permit: permit })
    }

    pub fn is_busy(&self) -> bool {
        self.slot.available_permits() == 0
    }

    /// Take the slot and run; `Busy` without calling the backend if it is taken.
    pub async fn try_optimize(&self, session: &ChatSession, user_message: &str) -> PlanOutcome {
        let Some(slot) = self.try_begin() else {
            debug!(conversation = %session.id(), "Planning already in flight, dropping trigger");
            return PlanOutcome::Busy;
        };
        self.optimize(&slot, session, user_message).await
    }

    /// Run the planning pipeline for one user message.
    pub async fn optimize(&self, _slot: &PlanSlot, session: &ChatSession, user_message: &str) -> PlanOutcome {
        self.events.publish(HostEvent::PluginTriggered {
            conversation_id: session.id().clone(),
        });

        let settings = self.settings.snapshot();
        if !settings.enabled {
            debug!("Planner disabled, skipping");
            return PlanOutcome::Skipped;
        }
        if !settings.api_settings.has_backend() {
            debug!(mode = ?settings.api_settings.api_mode, "No API URL configured, skipping");
            return PlanOutcome::Skipped;
        }

        info!(conversation = %session.id(), chars = user_message.chars().count(), "Planning started");
        self.notify(NoticeLevel::Info, "Planning the next scene...");

        match self.run(&settings, session, user_message).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Planning run failed");
                self.notify(
                    NoticeLevel::Error,
                    "Planning failed; the message will be sent unchanged.",
                );
                PlanOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn run(&self, settings: &Settings, session: &ChatSession, user_message: &str) -> Result<PlanOutcome> {
        let overrides = self.character_overrides(session).await;
        let mut api = settings.resolve(overrides.as_ref());
        let provider = self.router.select(&api)?;

        let conversation = session.snapshot().await;
        let history = recent_assistant_turns(&conversation, api.context_turn_count);
        let previous_plot = last_plot(&conversation);
        let worldbook = match &self.worldbook {
            Some(source) if api.worldbook_enabled => {
                source.combined_content(&conversation, user_message).await?
            }
            _ => String::new(),
        };
        let tables = table_text(self.tables.as_deref());

        ReplacementMap::for_run(&api, &tables, &previous_plot).apply_prompts(&mut api);
        let request = build_planning_request(user_message, &history, &api, &worldbook);

        debug!(
            provider = provider.name(),
            model = %request.model,
            messages = request.messages.len(),
            history = history.len(),
            worldbook_chars = worldbook.len(),
            "Planning request built"
        );

        let min_length = settings.min_length as usize;
        let (response, attempts) = if min_length == 0 {
            let text = provider.complete(request).await?.message.content;
            if text.is_empty() {
                warn!("Planning response was empty");
                self.notify(NoticeLevel::Warning, "The planner returned nothing; the message is unchanged.");
                return Ok(PlanOutcome::Empty);
            }
            (text, 1)
        } else {
            match self.complete_with_retries(provider.as_ref(), &request, min_length).await? {
                Some(accepted) => accepted,
                None => {
                    warn!(attempts = self.max_attempts, min_length, "Planning retries exhausted");
                    self.notify(
                        NoticeLevel::Error,
                        format!(
                            "No response reached {min_length} characters after {} attempts; the message is unchanged.",
                            self.max_attempts
                        ),
                    );
                    return Ok(PlanOutcome::Exhausted {
                        attempts: self.max_attempts,
                    });
                }
            }
        };

        self.handoff.stash(session.id(), response.clone());

        let tags = parse_tag_list(&api.extract_tags);
        let (injected, extracted_tags) = match extract_tagged(&response, &tags) {
            Some(fragments) => {
                info!(tags = ?tags, chars = fragments.chars().count(), "Extracted tagged fragments");
                self.notify(NoticeLevel::Info, format!("Extracted tags: {}", tags.join(", ")));
                (fragments, true)
            }
            None => (response.clone(), false),
        };

        let message = compose_final_message(user_message, api.final_directive_or_default(), &injected);
        info!(attempts, chars = message.chars().count(), "Planning finished");
        self.notify(NoticeLevel::Success, "Plot planned.");

        Ok(PlanOutcome::Planned(PlannedMessage {
            message,
            plot: response,
            injected,
            attempts,
            extracted_tags,
        }))
    }

    /// Call until a response reaches `min_length` characters, up to `max_attempts`.
    async fn complete_with_retries(
        &self,
        provider: &dyn Provider,
        request: &ProviderRequest,
        min_length: usize,
    ) -> Result<Option<(String, u32)>> {
        for attempt in 1..=self.max_attempts {
            let text = provider.complete(request.clone()).await?.message.content;
            let length = text.chars().count();

            if length >= min_length {
                debug!(attempt, length, "Planning response accepted");
                return Ok(Some((text, attempt)));
            }

            warn!(attempt, length, min_length, "Planning response too short");
            if attempt < self.max_attempts {
                self.notify(
                    NoticeLevel::Warning,
                    format!(
                        "Response too short ({length}/{min_length} characters), retrying ({attempt}/{})",
                        self.max_attempts
                    ),
                );
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        Ok(None)
    }

    /// The active character's override blob, if a store and character exist.
    async fn character_overrides(&self, session: &ChatSession) -> Option<ApiSettingsOverride> {
        let (Some(store), Some(character)) = (&self.characters, session.character()) else {
            return None;
        };

        match store.extension_data(character).await {
            Ok(Some(blob)) => ApiSettingsOverride::from_extension_blob(&blob),
            Ok(None) => None,
            Err(e) => {
                warn!(character, error = %e, "Failed to read character overrides");
                None
            }
        }
    }

    pub(crate) fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        self.events.publish(HostEvent::notice(level, NOTICE_TITLE, message));
    }
}
