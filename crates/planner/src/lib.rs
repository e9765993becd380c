//! The plot-planning pipeline.
//!
//! Intercepts a user's chat message before generation, asks a completion
//! backend for a plot plan using the recent story, memory tables, worldbook
//! and the previous plan as context, then splices the plan back into the
//! outgoing message:
//!
//! 1. **Hook** — a lifecycle event or the generation pipeline hands over the user text
//! 2. **Context** — recent assistant turns, previous plot, tables, worldbook
//! 3. **Template** — `sulv1..4`, `$5`, `$6` substituted into the prompts
//! 4. **Call** — the completion backend, retried until long enough
//! 5. **Splice** — `user + directive + plot`; the raw plot waits for the reply

pub mod context;
pub mod extract;
pub mod handoff;
pub mod hooks;
pub mod placeholder;
pub mod planner;
pub mod request;
pub mod session;
pub mod tables;
pub mod worldbook;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use extract::{extract_tagged, parse_tag_list};
pub use handoff::PlotHandoff;
pub use hooks::{
    GenerateHandler, GenerateOptions, GenerationKind, GenerationMiddleware, GenerationParams,
    GenerationPipeline, Inject, Next, PlanningStage,
};
pub use placeholder::ReplacementMap;
pub use planner::{PlanOutcome, PlanSlot, PlannedMessage, Planner};
pub use session::{ChatSession, SessionRegistry};
pub use tables::format_tables;
pub use worldbook::{StaticWorldbook, WorldbookEntry};
