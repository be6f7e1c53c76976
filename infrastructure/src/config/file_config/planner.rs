//! Meta-planner configuration from TOML (`[planner]` section, §4.5, §10.4).

use quorum_application::use_cases::meta_planner::{ModelPlannerConfig, PlannerMode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePlannerConfig {
    /// `"static"`, `"model"`, or `"hybrid"`; unrecognized values fall back to `"hybrid"`.
    pub mode: String,
    /// Model id to call in `model`/`hybrid` mode; required unless mode is `static`.
    pub model_id: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for FilePlannerConfig {
    fn default() -> Self {
        Self { mode: "hybrid".to_string(), model_id: None, temperature: 0.3, max_tokens: 2000 }
    }
}

impl FilePlannerConfig {
    pub fn parse_mode(&self) -> PlannerMode {
        match self.mode.to_lowercase().as_str() {
            "static" => PlannerMode::Static,
            "model" => PlannerMode::Model,
            _ => PlannerMode::Hybrid,
        }
    }

    pub fn model_config(&self) -> Option<ModelPlannerConfig> {
        self.model_id.as_ref().map(|id| {
            let mut cfg = ModelPlannerConfig::new(id.clone());
            cfg.temperature = self.temperature;
            cfg.max_tokens = self.max_tokens;
            cfg
        })
    }
}
