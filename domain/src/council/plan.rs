//! Council Plan (§3, §4.5): the meta-planner's output, plus the iteration,
//! memory and session configuration shapes it and the pipeline share.

use super::role::Role;
use super::voting::VotingMethod;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
    Expert,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Simple => "simple",
            Complexity::Moderate => "moderate",
            Complexity::Complex => "complex",
            Complexity::Expert => "expert",
        }
    }

    /// Whether this complexity is eligible for hybrid-mode escalation to the
    /// model planner (§4.5).
    pub fn escalates_in_hybrid(&self) -> bool {
        matches!(self, Complexity::Complex | Complexity::Expert)
    }
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IterationStrategy {
    Refine,
    Escalate,
    Specialize,
    Debate,
}

impl IterationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            IterationStrategy::Refine => "refine",
            IterationStrategy::Escalate => "escalate",
            IterationStrategy::Specialize => "specialize",
            IterationStrategy::Debate => "debate",
        }
    }
}

impl std::fmt::Display for IterationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One planned seat in the council, before a live `Member` is realized (§4.6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedMember {
    pub model: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl PlannedMember {
    pub fn new(model: impl Into<String>, role: Role) -> Self {
        Self { model: model.into(), role, persona: None, weight: None }
    }

    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = Some(persona.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }
}

/// The meta-planner's output (§3, §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilPlan {
    pub complexity: Complexity,
    pub domain: String,
    pub reasoning: String,
    pub council_size: usize,
    pub members: Vec<PlannedMember>,
    pub voting_method: VotingMethod,
    pub allow_iterations: bool,
    pub max_iterations: usize,
    pub iteration_strategy: IterationStrategy,
}

pub const MIN_COUNCIL_SIZE: usize = 3;
pub const MAX_COUNCIL_SIZE: usize = 9;
pub const MIN_MAX_ITERATIONS: usize = 1;
pub const MAX_MAX_ITERATIONS: usize = 5;

impl CouncilPlan {
    /// Apply the safety clamps every plan must satisfy regardless of origin
    /// (static, model, or hybrid) per §4.5: size in `[3,9]`, member list
    /// trimmed/padded to size, unknown models dropped, exactly one synthesizer.
    ///
    /// `known_models` is the set of model ids with a registered adapter;
    /// members naming an unknown model are dropped before padding.
    pub fn apply_safety_clamps(mut self, known_models: &[String]) -> Self {
        self.members.retain(|m| known_models.is_empty() || known_models.iter().any(|k| k == &m.model));

        self.council_size = self.council_size.clamp(MIN_COUNCIL_SIZE, MAX_COUNCIL_SIZE);
        self.max_iterations = self.max_iterations.clamp(MIN_MAX_ITERATIONS, MAX_MAX_ITERATIONS);

        if self.members.len() > self.council_size {
            self.members.truncate(self.council_size);
        } else {
            while self.members.len() < self.council_size {
                let fallback_model = self
                    .members
                    .first()
                    .map(|m| m.model.clone())
                    .or_else(|| known_models.first().cloned())
                    .unwrap_or_else(|| "unknown".to_string());
                self.members.push(PlannedMember::new(fallback_model, Role::OpinionGiver));
            }
        }

        if !self.members.iter().any(|m| m.role == Role::Synthesizer) {
            if let Some(last) = self.members.last_mut() {
                last.role = Role::Synthesizer;
            }
        }

        self
    }
}

/// Resource budgets enforced by the Iteration Controller (§4.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IterationConfig {
    pub enabled: bool,
    pub max_iterations: usize,
    pub max_total_tokens: u64,
    pub max_duration_ms: u64,
    pub max_depth: usize,
    /// `[0, 1]`.
    pub convergence_threshold: f64,
    pub improvement_threshold: f64,
    pub strategy: IterationStrategy,
}

impl IterationConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_iterations: 1,
            max_total_tokens: u64::MAX,
            max_duration_ms: u64::MAX,
            max_depth: 1,
            convergence_threshold: 1.0,
            improvement_threshold: 0.0,
            strategy: IterationStrategy::Refine,
        }
    }
}

impl Default for IterationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_iterations: 3,
            max_total_tokens: 100_000,
            max_duration_ms: 120_000,
            max_depth: 3,
            convergence_threshold: 0.85,
            improvement_threshold: 0.02,
            strategy: IterationStrategy::Refine,
        }
    }
}

/// Memory manager configuration (§4.4).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub enabled: bool,
    pub compression_enabled: bool,
    pub max_context_tokens: u64,
    pub persist_consensus: bool,
    pub persist_disagreements: bool,
    pub persist_key_insights: bool,
    pub long_term_enabled: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            compression_enabled: true,
            max_context_tokens: 4_000,
            persist_consensus: true,
            persist_disagreements: true,
            persist_key_insights: true,
            long_term_enabled: false,
        }
    }
}

/// Per-session overrides consumed by the Council Pipeline (§4.6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionConfig {
    pub self_correction_enabled: bool,
    /// Self-correction triggers when `confidenceAvg` falls below this.
    pub self_correction_threshold: f64,
    pub max_correction_rounds: usize,
    pub parallel_execution: bool,
    pub timeout_ms: u64,
    pub debug_mode: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            self_correction_enabled: true,
            self_correction_threshold: 0.6,
            max_correction_rounds: 2,
            parallel_execution: true,
            timeout_ms: 180_000,
            debug_mode: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(size: usize, members: usize) -> CouncilPlan {
        CouncilPlan {
            complexity: Complexity::Moderate,
            domain: "general".into(),
            reasoning: "test".into(),
            council_size: size,
            members: (0..members).map(|i| PlannedMember::new(format!("m{i}"), Role::OpinionGiver)).collect(),
            voting_method: VotingMethod::Majority,
            allow_iterations: false,
            max_iterations: 1,
            iteration_strategy: IterationStrategy::Refine,
        }
    }

    // S-adjacent: §8 property 6 — size clamp
    #[test]
    fn clamps_oversized_plan() {
        let p = plan(20, 20).apply_safety_clamps(&[]);
        assert_eq!(p.council_size, MAX_COUNCIL_SIZE);
        assert_eq!(p.members.len(), MAX_COUNCIL_SIZE);
    }

    #[test]
    fn clamps_undersized_plan() {
        let p = plan(0, 0).apply_safety_clamps(&[]);
        assert_eq!(p.council_size, MIN_COUNCIL_SIZE);
        assert_eq!(p.members.len(), MIN_COUNCIL_SIZE);
    }

    #[test]
    fn pads_short_member_list() {
        let p = plan(5, 2).apply_safety_clamps(&[]);
        assert_eq!(p.members.len(), 5);
    }

    #[test]
    fn drops_unknown_models() {
        let mut p = plan(3, 3);
        p.members.push(PlannedMember::new("ghost-model", Role::Reviewer));
        let known: Vec<String> = vec!["m0".into(), "m1".into(), "m2".into()];
        let p = p.apply_safety_clamps(&known);
        assert!(p.members.iter().all(|m| m.model != "ghost-model"));
    }

    #[test]
    fn always_has_exactly_one_synthesizer() {
        let p = plan(3, 3).apply_safety_clamps(&[]);
        assert_eq!(p.members.iter().filter(|m| m.role == Role::Synthesizer).count(), 1);
    }

    #[test]
    fn preserves_existing_synthesizer() {
        let mut p = plan(3, 3);
        p.members[1].role = Role::Synthesizer;
        let p = p.apply_safety_clamps(&[]);
        assert_eq!(p.members.iter().filter(|m| m.role == Role::Synthesizer).count(), 1);
        assert_eq!(p.members[1].role, Role::Synthesizer);
    }
}
