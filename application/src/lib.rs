//! Application layer for the council orchestrator.
//!
//! This crate contains use cases and port definitions.
//! It depends only on the domain layer.

pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use ports::event_bus::{EventBus, EventHandler, TraceStore};
pub use ports::model_adapter::{
    AdapterError, CompletionOptions, CompletionResponse, FinishReason, ModelAdapter, ReasoningEffort, ResponseFormat,
};
pub use ports::session_repository::{RepositoryError, SessionRepository};
pub use use_cases::council_pipeline::{CouncilPipeline, PipelineError, RunOptions};
pub use use_cases::iteration_controller::{IterationContext, IterationController, StopReason};
pub use use_cases::memory_manager::MemoryManager;
pub use use_cases::meta_planner::{MetaPlanner, ModelPlannerConfig, PlannerError, PlannerMode};
