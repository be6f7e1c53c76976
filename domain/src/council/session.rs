//! Council session (§3): the single mutable, append-only aggregate of a
//! deliberation. Every other entity in a session is immutable from the
//! moment it is added (§3 Lifecycles).

use super::member::Member;
use super::plan::{CouncilPlan, IterationConfig, MemoryConfig, SessionConfig};
use super::stage::StageResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One iteration's confidence/cost snapshot (§3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IterationSnapshot {
    pub number: usize,
    pub confidence: f64,
    pub tokens_used: u64,
    pub duration_ms: u64,
}

/// The per-session overrides actually in force, captured once at session
/// start so a replayed/serialized session is self-describing (§3 `dynamicConfig`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DynamicConfig {
    pub iteration: IterationConfig,
    pub memory: MemoryConfig,
    pub session: SessionConfig,
}

/// The Council Pipeline's (C6) aggregate root (§3).
///
/// Created `pending`, becomes `running` at the first stage, ends
/// `completed` or `failed`; append-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilSession {
    pub id: String,
    pub question: String,
    pub config: CouncilPlan,
    pub members: Vec<Member>,
    pub stages: Vec<StageResult>,
    pub iterations: Vec<IterationSnapshot>,
    pub final_answer: Option<String>,
    pub final_confidence: Option<f64>,
    pub status: SessionStatus,
    pub correction_rounds: usize,
    pub total_tokens: u64,
    pub total_duration_ms: u64,
    pub created_at: u64,
    pub updated_at: u64,
    pub completed_at: Option<u64>,
    pub error: Option<String>,
    pub dynamic_config: Option<DynamicConfig>,
}

impl CouncilSession {
    pub fn new(id: impl Into<String>, question: impl Into<String>, config: CouncilPlan, created_at: u64) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            config,
            members: Vec::new(),
            stages: Vec::new(),
            iterations: Vec::new(),
            final_answer: None,
            final_confidence: None,
            status: SessionStatus::Pending,
            correction_rounds: 0,
            total_tokens: 0,
            total_duration_ms: 0,
            created_at,
            updated_at: created_at,
            completed_at: None,
            error: None,
            dynamic_config: None,
        }
    }

    pub fn with_dynamic_config(mut self, dynamic_config: DynamicConfig) -> Self {
        self.dynamic_config = Some(dynamic_config);
        self
    }

    pub fn with_members(mut self, members: Vec<Member>) -> Self {
        self.members = members;
        self
    }

    pub fn start_running(&mut self, now: u64) {
        if self.status == SessionStatus::Pending {
            self.status = SessionStatus::Running;
        }
        self.updated_at = now;
    }

    pub fn push_stage(&mut self, stage: StageResult, now: u64) {
        self.total_tokens += stage.total_tokens();
        self.stages.push(stage);
        self.updated_at = now;
    }

    pub fn push_iteration(&mut self, snapshot: IterationSnapshot, now: u64) {
        self.iterations.push(snapshot);
        self.updated_at = now;
    }

    /// Invariant 5 (§3): `finalAnswer != null ⇔ status = completed`.
    pub fn complete(&mut self, final_answer: impl Into<String>, final_confidence: f64, now: u64) {
        self.final_answer = Some(final_answer.into());
        self.final_confidence = Some(final_confidence);
        self.status = SessionStatus::Completed;
        self.completed_at = Some(now);
        self.total_duration_ms = now.saturating_sub(self.created_at);
        self.updated_at = now;
    }

    pub fn fail(&mut self, error: impl Into<String>, now: u64) {
        self.status = SessionStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(now);
        self.total_duration_ms = now.saturating_sub(self.created_at);
        self.updated_at = now;
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, SessionStatus::Completed | SessionStatus::Failed)
    }

    /// Checks invariant 5 directly, for tests and property checks (§8.7).
    pub fn final_answer_matches_status(&self) -> bool {
        (self.final_answer.is_some()) == (self.status == SessionStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::council::plan::{Complexity, IterationStrategy};
    use crate::council::voting::VotingMethod;

    fn plan() -> CouncilPlan {
        CouncilPlan {
            complexity: Complexity::Simple,
            domain: "general".into(),
            reasoning: "test".into(),
            council_size: 3,
            members: vec![],
            voting_method: VotingMethod::Majority,
            allow_iterations: false,
            max_iterations: 1,
            iteration_strategy: IterationStrategy::Refine,
        }
    }

    #[test]
    fn starts_pending_with_no_final_answer() {
        let s = CouncilSession::new("s1", "Q?", plan(), 0);
        assert_eq!(s.status, SessionStatus::Pending);
        assert!(s.final_answer_matches_status());
    }

    #[test]
    fn complete_sets_final_answer_and_status_together() {
        let mut s = CouncilSession::new("s1", "Q?", plan(), 0);
        s.start_running(1);
        s.complete("42", 0.9, 5);
        assert_eq!(s.status, SessionStatus::Completed);
        assert_eq!(s.final_answer.as_deref(), Some("42"));
        assert!(s.final_answer_matches_status());
    }

    #[test]
    fn failed_session_has_no_final_answer() {
        let mut s = CouncilSession::new("s1", "Q?", plan(), 0);
        s.fail("boom", 5);
        assert_eq!(s.status, SessionStatus::Failed);
        assert!(s.final_answer.is_none());
        assert!(s.final_answer_matches_status());
    }

    #[test]
    fn complete_and_fail_set_total_duration_from_created_at() {
        let mut completed = CouncilSession::new("s1", "Q?", plan(), 100);
        completed.complete("42", 0.9, 340);
        assert_eq!(completed.total_duration_ms, 240);

        let mut failed = CouncilSession::new("s2", "Q?", plan(), 100);
        failed.fail("boom", 180);
        assert_eq!(failed.total_duration_ms, 80);
    }

    #[test]
    fn is_terminal_for_completed_and_failed_only() {
        let mut s = CouncilSession::new("s1", "Q?", plan(), 0);
        assert!(!s.is_terminal());
        s.start_running(1);
        assert!(!s.is_terminal());
        s.complete("ok", 0.8, 2);
        assert!(s.is_terminal());
    }
}
