//! Interception hooks: host lifecycle events and the generation pipeline.
//!
//! Both share the planner's in-flight slot. A lifecycle signal that arrives
//! while the pipeline is planning returns early; a pipeline call that finds
//! the slot taken passes through unmodified.

pub mod lifecycle;
pub mod middleware;

pub use lifecycle::{GenerationKind, GenerationParams};
pub use middleware::{
    GenerateHandler, GenerateOptions, GenerationMiddleware, GenerationPipeline, Inject, Next,
    PlanningStage,
};
