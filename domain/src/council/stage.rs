//! Deliberation stage (§3): Opinions -> Review -> Voting -> Synthesis, with
//! an optional iterative back-edge from Synthesis to Opinions.

use super::response::MemberResponse;
use super::vote::Vote;
use super::voting::VotingResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Opinions,
    Review,
    Voting,
    Synthesis,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Opinions => "opinions",
            Stage::Review => "review",
            Stage::Voting => "voting",
            Stage::Synthesis => "synthesis",
        }
    }

    /// The stage that follows this one in a single pass, ignoring the
    /// iteration controller's possible back-edge to `Opinions`.
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Opinions => Some(Stage::Review),
            Stage::Review => Some(Stage::Voting),
            Stage::Voting => Some(Stage::Synthesis),
            Stage::Synthesis => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The stage-specific payload produced by running one stage (§3, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StagePayload {
    Opinions { responses: Vec<MemberResponse> },
    Review { responses: Vec<MemberResponse> },
    Voting { votes: Vec<Vote>, result: VotingResult },
    Synthesis { response: MemberResponse, digest: String },
}

/// Outcome of running one stage for one iteration, carrying the timing
/// window every response in it must fall within (§3 invariant 2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResult {
    pub payload: StagePayload,
    pub start_time: u64,
    pub end_time: u64,
}

impl StageResult {
    pub fn new(payload: StagePayload, start_time: u64, end_time: u64) -> Self {
        Self { payload, start_time, end_time }
    }

    pub fn stage(&self) -> Stage {
        match &self.payload {
            StagePayload::Opinions { .. } => Stage::Opinions,
            StagePayload::Review { .. } => Stage::Review,
            StagePayload::Voting { .. } => Stage::Voting,
            StagePayload::Synthesis { .. } => Stage::Synthesis,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        self.end_time.saturating_sub(self.start_time)
    }

    /// Sum of `tokenUsage.total` across every response this stage produced
    /// (§3 invariant 4: accounting consistency with iteration token totals).
    pub fn total_tokens(&self) -> u64 {
        match &self.payload {
            StagePayload::Opinions { responses } | StagePayload::Review { responses } => {
                responses.iter().map(|r| r.token_usage.total as u64).sum()
            }
            StagePayload::Voting { .. } => 0,
            StagePayload::Synthesis { response, .. } => response.token_usage.total as u64,
        }
    }

    pub fn responses(&self) -> &[MemberResponse] {
        match &self.payload {
            StagePayload::Opinions { responses } | StagePayload::Review { responses } => responses,
            StagePayload::Voting { .. } => &[],
            StagePayload::Synthesis { .. } => &[],
        }
    }

    pub fn voting_result(&self) -> Option<&VotingResult> {
        match &self.payload {
            StagePayload::Voting { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Invariant 2 (§3): every response timestamp lies in `[start_time, end_time]`.
    pub fn responses_within_window(&self) -> bool {
        self.responses().iter().all(|r| r.timestamp >= self.start_time && r.timestamp <= self.end_time)
    }
}
