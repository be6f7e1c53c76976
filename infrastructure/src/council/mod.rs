//! Infrastructure implementations of the council's ports (C1 adapters, C7
//! event bus, C8 session repository). Everything under `domain::council` /
//! `application::{ports, use_cases::{council_pipeline, iteration_controller,
//! memory_manager, meta_planner}}` is pure or in-memory; this module supplies
//! the concrete I/O the pipeline is wired against at the CLI boundary.

pub mod azure_chat;
pub mod event_bus;
mod model_error;
pub mod openai_compatible;
pub mod registry;
pub mod session_repository;

pub use azure_chat::{AzureChatAdapter, AzureChatConfig};
pub use event_bus::InProcessEventBus;
pub use openai_compatible::{OpenAiCompatibleAdapter, OpenAiCompatibleConfig};
pub use registry::AdapterRegistry;
pub use session_repository::InMemorySessionRepository;
