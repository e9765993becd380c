//! Lifecycle-event handlers: generation start, generation end, chat change.

use std::sync::Arc;

use plotmaster_config::{strip_prompt_keys, Settings};
use plotmaster_core::error::{Error, Result};
use plotmaster_core::event::HostEvent;
use plotmaster_core::message::Role;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::planner::{PlanOutcome, Planner};
use crate::session::{ChatSession, SessionRegistry};

/// The kind of generation the host is about to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenerationKind {
    #[default]
    Normal,
    Regenerate,
    Swipe,
    Continue,
    Impersonate,
    Quiet,
}

/// The outgoing generation payload as seen by the lifecycle hook.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationParams {
    pub prompt: Option<String>,

    /// Set by the generation pipeline once it has already planned this action
    pub processed_by_hook: bool,
}

impl Planner {
    /// Handle the "generation about to start" signal.
    ///
    /// Prefers the just-sent user message; falls back to the input box.
    /// Returns `None` when nothing was attempted.
    pub async fn on_generation_after_commands(
        &self,
        session: &ChatSession,
        kind: GenerationKind,
        params: &mut GenerationParams,
        dry_run: bool,
    ) -> Option<PlanOutcome> {
        if params.processed_by_hook {
            debug!("Generation already planned by the pipeline");
            return None;
        }
        if kind == GenerationKind::Regenerate || dry_run {
            debug!(?kind, dry_run, "Generation not eligible for planning");
            return None;
        }
        if !self.settings().snapshot().enabled {
            return None;
        }
        let Some(slot) = self.try_begin() else {
            debug!("Planning already in flight, ignoring generation signal");
            return None;
        };

        let pending = {
            let mut conversation = session.conversation_mut().await;
            match conversation.last_mut() {
                Some(last) if last.is_user() && !last.processed => {
                    last.processed = true;
                    Some((last.id.clone(), last.content.clone()))
                }
                _ => None,
            }
        };

        // A blank stored turn stays marked but falls through to the input box.
        if let Some((id, original)) = pending.filter(|(_, text)| !text.trim().is_empty()) {
            let outcome = self.optimize(&slot, session, &original).await;
            match &outcome {
                PlanOutcome::Planned(planned) => {
                    params.prompt = Some(planned.message.clone());

                    let index = {
                        let mut conversation = session.conversation_mut().await;
                        let index = conversation.find_mut(&id).map(|(index, message)| {
                            message.content = planned.message.clone();
                            index
                        });
                        conversation.touch();
                        index
                    };
                    if let Some(index) = index {
                        self.events().publish(HostEvent::MessageUpdated {
                            conversation_id: session.id().clone(),
                            index,
                        });
                    }

                    if session.clear_input_if(&original).await {
                        debug!("Cleared input box after rewriting the sent message");
                    }
                }
                PlanOutcome::Failed { .. } => {
                    let mut conversation = session.conversation_mut().await;
                    if let Some((_, message)) = conversation.find_mut(&id) {
                        message.processed = false;
                    }
                }
                _ => {}
            }
            return Some(outcome);
        }

        let input = session.input_text().await;
        if input.trim().is_empty() {
            return None;
        }

        let outcome = self.optimize(&slot, session, &input).await;
        if let PlanOutcome::Planned(planned) = &outcome {
            session.set_input(planned.message.clone()).await;
        }
        Some(outcome)
    }

    /// Attach the pending plot to the assistant turn that just finished.
    ///
    /// The pending plot is consumed whether or not it could be attached.
    pub async fn on_generation_ended(&self, session: &ChatSession) -> bool {
        let Some(plot) = self.handoff().take(session.id()) else {
            return false;
        };

        let mut conversation = session.conversation_mut().await;
        let attached = match conversation.last_mut() {
            Some(last) if last.role == Role::Assistant => {
                last.plot = Some(plot);
                true
            }
            _ => false,
        };

        if attached {
            conversation.touch();
            info!(conversation = %session.id(), "Plot attached to assistant turn");
        } else {
            debug!(conversation = %session.id(), "No assistant turn to attach plot to, discarding");
        }
        attached
    }

    /// Reload the last-used preset and drop stale prompt overrides from the
    /// active character's card. Returns whether a preset was applied.
    pub async fn on_chat_changed(&self, session: &ChatSession) -> Result<bool> {
        let applied = self.settings().update(Settings::apply_last_used_preset);
        if applied {
            self.strip_character_overrides(session).await;
        }

        self.settings()
            .persist()
            .map_err(|e| Error::Config { message: e.to_string() })?;
        Ok(applied)
    }

    async fn strip_character_overrides(&self, session: &ChatSession) {
        let (Some(store), Some(character)) = (self.character_store(), session.character()) else {
            return;
        };

        let mut blob = match store.extension_data(character).await {
            Ok(Some(blob)) => blob,
            Ok(None) => return,
            Err(e) => {
                warn!(character, error = %e, "Failed to read character card");
                return;
            }
        };

        if !strip_prompt_keys(&mut blob) {
            return;
        }

        match store.merge_extension_data(character, blob).await {
            Ok(()) => info!(character, "Removed prompt overrides superseded by the preset"),
            Err(e) => warn!(character, error = %e, "Failed to update character card"),
        }
    }

    /// Route `GenerationEnded` and `ChatChanged` events to their handlers.
    pub fn spawn_listeners(self: Arc<Self>, sessions: Arc<SessionRegistry>) -> JoinHandle<()> {
        let mut rx = self.events().subscribe();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => self.route_event(&sessions, &event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Event listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Event listener stopped");
        })
    }

    async fn route_event(&self, sessions: &SessionRegistry, event: &HostEvent) {
        match event {
            HostEvent::GenerationEnded { conversation_id } => {
                if let Some(session) = sessions.get(conversation_id).await {
                    self.on_generation_ended(&session).await;
                }
            }
            HostEvent::ChatChanged { conversation_id } => {
                sessions.activate(conversation_id).await;
                let Some(session) = sessions.get(conversation_id).await else {
                    debug!(conversation = %conversation_id, "Chat changed to an unknown session");
                    return;
                };
                if let Err(e) = self.on_chat_changed(&session).await {
                    warn!(error = %e, "Chat change handling failed");
                }
            }
            _ => {}
        }
    }
}
