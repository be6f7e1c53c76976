//! Raw TOML configuration data types (§10.4).
//!
//! These structs represent the exact structure of the council's config
//! file; most sections deserialize straight into domain/application types
//! (`IterationConfig`, `MemoryConfig`, `SessionConfig` already derive
//! `Serialize`/`Deserialize` with sensible `Default`s) rather than through
//! an intermediate DTO layer, since they carry no I/O-specific fields.

mod output;
mod planner;

pub use output::{FileOutputConfig, FileOutputFormat};
pub use planner::FilePlannerConfig;

use crate::council::registry::ModelEndpoint;
use quorum_domain::council::{IterationConfig, MemoryConfig, SessionConfig};
use serde::{Deserialize, Serialize};

/// Complete file configuration (raw TOML structure, §10.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// The model registry: one entry per model the council can seat.
    pub models: Vec<ModelEndpoint>,
    pub planner: FilePlannerConfig,
    pub iteration: IterationConfig,
    pub memory: MemoryConfig,
    pub session: SessionConfig,
    pub output: FileOutputConfig,
}
