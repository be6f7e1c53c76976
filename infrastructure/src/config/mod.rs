//! Configuration file loading for the council orchestrator (§10.4).
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `--config <path>` specified file
//! 2. Project root: `./council.toml` or `./.council.toml`
//! 3. XDG config: `$XDG_CONFIG_HOME/council-orchestrator/config.toml`
//! 4. Fallback: `~/.config/council-orchestrator/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{FileConfig, FileOutputConfig, FileOutputFormat, FilePlannerConfig};
pub use loader::ConfigLoader;
