//! Council member entity.

use super::model_config::ModelConfig;
use super::role::Role;
use serde::{Deserialize, Serialize};

/// One participant in a council session: a role bound to a model, with an
/// optional persona override and a voting weight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub model: ModelConfig,
    /// Overrides the role's canonical system prompt when present.
    pub persona: Option<String>,
    /// Voting weight, clamped to `[0, 2]` at construction.
    pub weight: f64,
    pub is_active: bool,
    pub is_backup: bool,
}

impl Member {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: Role, model: ModelConfig) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            model,
            persona: None,
            weight: 1.0,
            is_active: true,
            is_backup: false,
        }
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight.clamp(0.0, 2.0);
        self
    }

    pub fn as_backup(mut self) -> Self {
        self.is_backup = true;
        self.is_active = false;
        self
    }

    pub fn activate(&mut self) {
        self.is_active = true;
    }

    /// The system prompt to use for this member: persona override, else the
    /// role's canonical prompt (§6.4).
    pub fn system_prompt(&self) -> &str {
        self.persona.as_deref().unwrap_or_else(|| self.role.canonical_system_prompt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::council::model_config::ProviderKind;

    fn model() -> ModelConfig {
        ModelConfig::new("claude-sonnet-4.5", ProviderKind::AZURE_CHAT, "claude-sonnet-4-5")
    }

    #[test]
    fn weight_is_clamped() {
        let m = Member::new("m1", "Claude", Role::OpinionGiver, model()).with_weight(5.0);
        assert_eq!(m.weight, 2.0);
        let m = Member::new("m1", "Claude", Role::OpinionGiver, model()).with_weight(-1.0);
        assert_eq!(m.weight, 0.0);
    }

    #[test]
    fn persona_overrides_canonical_prompt() {
        let m = Member::new("m1", "Claude", Role::OpinionGiver, model()).with_persona("Be terse.");
        assert_eq!(m.system_prompt(), "Be terse.");
    }

    #[test]
    fn default_uses_canonical_prompt() {
        let m = Member::new("m1", "Claude", Role::OpinionGiver, model());
        assert_eq!(m.system_prompt(), Role::OpinionGiver.canonical_system_prompt());
    }

    #[test]
    fn backup_starts_inactive() {
        let m = Member::new("b1", "Backup", Role::Backup, model()).as_backup();
        assert!(m.is_backup);
        assert!(!m.is_active);
    }
}
