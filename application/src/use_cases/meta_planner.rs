//! Meta-Planner (C5, §4.5).
//!
//! Produces a [`CouncilPlan`] from a question. New relative to the teacher,
//! which hardcodes its council composition in `ModelConfig`/`QuorumConfig`
//! (`crate::config::QuorumConfig`); built in the application layer in that
//! config/validation idiom, using `quorum_domain::agent::validation`'s
//! `Severity`-style issue reporting for clamp warnings.

use crate::ports::model_adapter::{AdapterError, CompletionOptions, ModelAdapter, ResponseFormat};
use quorum_domain::council::{
    Complexity, CouncilPlan, IterationStrategy, Message, PlannedMember, Role, VotingMethod,
};
use regex::Regex;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlannerError {
    #[error("planner model returned invalid structured output: {0}")]
    SchemaViolation(String),
    #[error("no planner model available")]
    NoModelAvailable,
}

/// The meta-planner's operating mode (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlannerMode {
    Static,
    Model,
    #[default]
    Hybrid,
}

/// One ordered rule in the static planner's rule list: first regex match wins (§4.5).
pub struct PlannerRule {
    pub pattern: &'static str,
    pub preset: PresetName,
    pub complexity: Complexity,
    pub allow_iterations: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetName {
    Small,
    Standard,
    Reasoning,
    Diverse,
}

/// Length-ladder fallback thresholds (character count) used when no rule matches (§4.5).
#[derive(Debug, Clone, Copy)]
pub struct LadderThresholds {
    pub short: usize,
    pub medium: usize,
    pub long: usize,
}

impl Default for LadderThresholds {
    fn default() -> Self {
        Self { short: 60, medium: 200, long: 500 }
    }
}

/// Static-mode configuration: the ordered rule list plus the length-ladder fallback.
pub struct StaticPlannerConfig {
    pub rules: Vec<PlannerRule>,
    pub thresholds: LadderThresholds,
}

impl Default for StaticPlannerConfig {
    fn default() -> Self {
        Self {
            rules: vec![
                PlannerRule {
                    pattern: r"(?i)^(what is|define)\b",
                    preset: PresetName::Small,
                    complexity: Complexity::Simple,
                    allow_iterations: false,
                },
                PlannerRule {
                    pattern: r"(?i)\b(compare|vs\.?|versus)\b",
                    preset: PresetName::Standard,
                    complexity: Complexity::Moderate,
                    allow_iterations: true,
                },
                PlannerRule {
                    pattern: r"(?i)\b(design|architecture|roadmap)\b",
                    preset: PresetName::Reasoning,
                    complexity: Complexity::Complex,
                    allow_iterations: true,
                },
                PlannerRule {
                    pattern: r"(?i)\b(ethic|moral|polic(y|ies)|controvers)",
                    preset: PresetName::Diverse,
                    complexity: Complexity::Expert,
                    allow_iterations: true,
                },
            ],
            thresholds: LadderThresholds::default(),
        }
    }
}

/// Model-mode configuration: which model id to call and how (§4.5).
pub struct ModelPlannerConfig {
    pub model_id: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ModelPlannerConfig {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self { model_id: model_id.into(), temperature: 0.3, max_tokens: 2000 }
    }
}

pub struct MetaPlanner {
    pub mode: PlannerMode,
    pub static_config: StaticPlannerConfig,
    pub model_config: Option<ModelPlannerConfig>,
}

impl Default for MetaPlanner {
    fn default() -> Self {
        Self { mode: PlannerMode::default(), static_config: StaticPlannerConfig::default(), model_config: None }
    }
}

impl MetaPlanner {
    pub fn new(mode: PlannerMode) -> Self {
        Self { mode, ..Default::default() }
    }

    pub fn with_model_config(mut self, config: ModelPlannerConfig) -> Self {
        self.model_config = Some(config);
        self
    }

    /// Produce a `CouncilPlan` for `question` (§4.5). `planner_adapter` is the
    /// model used in `Model`/`Hybrid` mode; absent in pure `Static` mode.
    pub async fn plan(
        &self,
        question: &str,
        planner_adapter: Option<&dyn ModelAdapter>,
    ) -> Result<CouncilPlan, PlannerError> {
        match self.mode {
            PlannerMode::Static => Ok(self.plan_static(question)),
            PlannerMode::Model => self.plan_model(question, planner_adapter).await,
            PlannerMode::Hybrid => {
                let static_plan = self.plan_static(question);
                if static_plan.complexity.escalates_in_hybrid() && planner_adapter.is_some() {
                    match self.plan_model(question, planner_adapter).await {
                        Ok(model_plan) => Ok(model_plan),
                        Err(_) => Ok(static_plan),
                    }
                } else {
                    Ok(static_plan)
                }
            }
        }
    }

    /// Static mode: first matching rule wins; otherwise fall back to the
    /// length ladder (§4.5). The static planner cannot fail (§7).
    pub fn plan_static(&self, question: &str) -> CouncilPlan {
        for rule in &self.static_config.rules {
            if compiled_pattern(rule.pattern).is_match(question) {
                return self.plan_from_preset(rule.preset, rule.complexity, rule.allow_iterations, "matched rule");
            }
        }

        let len = question.chars().count();
        let t = &self.static_config.thresholds;
        if len < t.short {
            self.plan_from_preset(PresetName::Small, Complexity::Simple, false, "short question, length ladder")
        } else if len < t.medium {
            self.plan_from_preset(PresetName::Standard, Complexity::Moderate, false, "medium question, length ladder")
        } else if len < t.long {
            self.plan_from_preset(PresetName::Standard, Complexity::Moderate, true, "long question, length ladder")
        } else {
            self.plan_from_preset(PresetName::Diverse, Complexity::Complex, true, "very long question, length ladder")
        }
    }

    fn plan_from_preset(
        &self,
        preset: PresetName,
        complexity: Complexity,
        allow_iterations: bool,
        reasoning: &str,
    ) -> CouncilPlan {
        let p = preset.table();
        CouncilPlan {
            complexity,
            domain: "general".to_string(),
            reasoning: reasoning.to_string(),
            council_size: p.members.len(),
            members: p.members,
            voting_method: p.voting_method,
            allow_iterations,
            max_iterations: if allow_iterations { 3 } else { 1 },
            iteration_strategy: IterationStrategy::Refine,
        }
        .apply_safety_clamps(&[])
    }

    async fn plan_model(
        &self,
        question: &str,
        planner_adapter: Option<&dyn ModelAdapter>,
    ) -> Result<CouncilPlan, PlannerError> {
        let adapter = planner_adapter.ok_or(PlannerError::NoModelAvailable)?;
        let config = self.model_config.as_ref().ok_or(PlannerError::NoModelAvailable)?;

        let messages = vec![
            Message::system(PLANNER_SYSTEM_PROMPT),
            Message::user(format!("Question: {question}\n\nProduce a council plan as JSON matching the schema.")),
        ];
        let opts = CompletionOptions {
            max_tokens: config.max_tokens,
            temperature: Some(config.temperature),
            response_format: ResponseFormat::JsonSchema {
                name: "council_plan".to_string(),
                strict: true,
                schema: council_plan_json_schema(),
            },
            ..CompletionOptions::default()
        };

        let response = adapter
            .complete(&messages, &opts)
            .await
            .map_err(|e: AdapterError| PlannerError::SchemaViolation(e.to_string()))?;

        let parsed: CouncilPlanJson = serde_json::from_str(&response.content)
            .map_err(|e| PlannerError::SchemaViolation(e.to_string()))?;

        let plan: CouncilPlan = parsed.try_into().map_err(PlannerError::SchemaViolation)?;
        Ok(plan.apply_safety_clamps(&[]))
    }
}

impl PresetName {
    fn table(&self) -> PresetTable {
        match self {
            PresetName::Small => PresetTable {
                members: vec![
                    PlannedMember::new("claude-sonnet-4.5", Role::OpinionGiver),
                    PlannedMember::new("gpt-5.2", Role::Reviewer),
                    PlannedMember::new("claude-sonnet-4.5", Role::Synthesizer),
                ],
                voting_method: VotingMethod::Majority,
            },
            PresetName::Standard => PresetTable {
                members: vec![
                    PlannedMember::new("claude-sonnet-4.5", Role::OpinionGiver),
                    PlannedMember::new("gpt-5.2", Role::OpinionGiver),
                    PlannedMember::new("gemini-2.5-pro", Role::Reviewer),
                    PlannedMember::new("gpt-5.2", Role::FactChecker),
                    PlannedMember::new("claude-sonnet-4.5", Role::Synthesizer),
                ],
                voting_method: VotingMethod::super_majority_default(),
            },
            PresetName::Reasoning => PresetTable {
                members: vec![
                    PlannedMember::new("gpt-5.2-codex", Role::DomainExpert),
                    PlannedMember::new("claude-opus-4.5", Role::DomainExpert),
                    PlannedMember::new("gemini-2.5-pro", Role::Skeptic),
                    PlannedMember::new("gpt-5.2", Role::Reviewer),
                    PlannedMember::new("claude-opus-4.5", Role::Synthesizer),
                ],
                voting_method: VotingMethod::Confidence,
            },
            PresetName::Diverse => PresetTable {
                members: vec![
                    PlannedMember::new("claude-sonnet-4.5", Role::OpinionGiver),
                    PlannedMember::new("gpt-5.2", Role::DevilAdvocate),
                    PlannedMember::new("gemini-2.5-pro", Role::Creative),
                    PlannedMember::new("claude-opus-4.5", Role::DomainExpert),
                    PlannedMember::new("gpt-5.2-codex", Role::Skeptic),
                    PlannedMember::new("gemini-2.5-pro", Role::Reviewer),
                    PlannedMember::new("claude-sonnet-4.5", Role::Synthesizer),
                ],
                voting_method: VotingMethod::RankedChoice,
            },
        }
    }
}

struct PresetTable {
    members: Vec<PlannedMember>,
    voting_method: VotingMethod,
}

fn compiled_pattern(pattern: &'static str) -> &'static Regex {
    // Static rule patterns are few and fixed; a tiny process-lifetime cache
    // avoids recompiling the same regex on every `plan_static` call.
    static CACHE: OnceLock<std::sync::Mutex<std::collections::HashMap<&'static str, &'static Regex>>> =
        OnceLock::new();
    let cache = CACHE.get_or_init(|| std::sync::Mutex::new(std::collections::HashMap::new()));
    let mut guard = cache.lock().expect("regex cache mutex poisoned");
    if let Some(re) = guard.get(pattern) {
        return re;
    }
    let compiled: &'static Regex = Box::leak(Box::new(Regex::new(pattern).expect("static planner pattern is valid")));
    guard.insert(pattern, compiled);
    compiled
}

const PLANNER_SYSTEM_PROMPT: &str = "You are the meta-planner for a multi-model council. Given a question, \
decide the council's composition: how many members, what role and model each plays, which voting method to \
use, and whether iterative refinement should be allowed. Respond only with JSON matching the given schema.";

/// §6.5: the strict JSON Schema for the planner model's structured output.
/// Required keys per §6.5: `complexity, domain, reasoning, councilSize, roles, votingMethod, allowIterations`.
pub fn council_plan_json_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["complexity", "domain", "reasoning", "councilSize", "roles", "votingMethod", "allowIterations"],
        "properties": {
            "complexity": { "type": "string", "enum": ["simple", "moderate", "complex", "expert"] },
            "domain": { "type": "string" },
            "reasoning": { "type": "string" },
            "councilSize": { "type": "integer", "minimum": 3, "maximum": 9 },
            "roles": {
                "type": "array",
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["model", "role"],
                    "properties": {
                        "model": { "type": "string" },
                        "role": {
                            "type": "string",
                            "enum": [
                                "opinion-giver", "reviewer", "synthesizer", "backup", "arbiter",
                                "devil-advocate", "fact-checker", "domain-expert", "moderator",
                                "skeptic", "creative", "critic"
                            ]
                        },
                        "persona": { "type": ["string", "null"] },
                        "weight": { "type": ["number", "null"], "minimum": 0, "maximum": 2 }
                    }
                }
            },
            "votingMethod": {
                "type": "string",
                "enum": ["majority", "super-majority", "unanimous", "weighted", "confidence", "ranked-choice", "veto"]
            },
            "allowIterations": { "type": "boolean" },
            "maxIterations": { "type": "integer", "minimum": 1, "maximum": 5 },
            "iterationStrategy": { "type": "string", "enum": ["refine", "escalate", "specialize", "debate"] }
        }
    })
}

/// Wire shape returned by the planner model: `roles` (§6.5) maps onto
/// `CouncilPlan::members` (§3) — the spec's own data model and schema
/// sections disagree on this field's name; §6.5 (the schema contract the
/// model actually targets) wins here.
#[derive(Debug, Deserialize)]
struct CouncilPlanJson {
    complexity: Complexity,
    domain: String,
    reasoning: String,
    #[serde(rename = "councilSize")]
    council_size: usize,
    roles: Vec<PlannedMemberJson>,
    #[serde(rename = "votingMethod")]
    voting_method: String,
    #[serde(rename = "allowIterations")]
    allow_iterations: bool,
    #[serde(rename = "maxIterations", default = "default_max_iterations")]
    max_iterations: usize,
    #[serde(rename = "iterationStrategy", default)]
    iteration_strategy: Option<IterationStrategy>,
}

fn default_max_iterations() -> usize {
    3
}

#[derive(Debug, Deserialize)]
struct PlannedMemberJson {
    model: String,
    role: Role,
    #[serde(default)]
    persona: Option<String>,
    #[serde(default)]
    weight: Option<f64>,
}

impl TryFrom<CouncilPlanJson> for CouncilPlan {
    type Error = String;

    fn try_from(json: CouncilPlanJson) -> Result<Self, Self::Error> {
        let voting_method = VotingMethod::from_str(&json.voting_method)?;
        let members = json
            .roles
            .into_iter()
            .map(|m| {
                let mut pm = PlannedMember::new(m.model, m.role);
                if let Some(p) = m.persona {
                    pm = pm.with_persona(p);
                }
                if let Some(w) = m.weight {
                    pm = pm.with_weight(w);
                }
                pm
            })
            .collect();

        Ok(CouncilPlan {
            complexity: json.complexity,
            domain: json.domain,
            reasoning: json.reasoning,
            council_size: json.council_size,
            members,
            voting_method,
            allow_iterations: json.allow_iterations,
            max_iterations: json.max_iterations,
            iteration_strategy: json.iteration_strategy.unwrap_or(IterationStrategy::Refine),
        })
    }
}
