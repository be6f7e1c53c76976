//! Vote cast by a council member during the Voting stage.
//!
//! A position/confidence/rank/veto shape, richer than a plain approve/reject
//! flag, since the voting methods in [`super::voting`] need more than that
//! to compute their tallies.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub member_id: String,
    pub member_name: String,
    /// The position the member voted for.
    pub position: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    pub reasoning: String,
    /// Ranked preference order for ranked-choice tallying, most preferred first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<Vec<String>>,
    /// When true, this vote unconditionally blocks consensus under the `veto` method.
    #[serde(default)]
    pub veto: bool,
    pub timestamp: u64,
}

impl Vote {
    pub fn new(
        member_id: impl Into<String>,
        member_name: impl Into<String>,
        position: impl Into<String>,
        confidence: f64,
        reasoning: impl Into<String>,
        timestamp: u64,
    ) -> Self {
        Self {
            member_id: member_id.into(),
            member_name: member_name.into(),
            position: position.into(),
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: reasoning.into(),
            rank: None,
            veto: false,
            timestamp,
        }
    }

    pub fn with_rank(mut self, rank: Vec<String>) -> Self {
        self.rank = Some(rank);
        self
    }

    pub fn with_veto(mut self, veto: bool) -> Self {
        self.veto = veto;
        self
    }

    /// Short display name: the member name up to its first `-` or `_`.
    pub fn short_member_name(&self) -> &str {
        self.member_name.split(['-', '_']).next().unwrap_or(&self.member_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped() {
        let v = Vote::new("m1", "Claude", "A", 1.5, "r", 0);
        assert_eq!(v.confidence, 1.0);
        let v = Vote::new("m1", "Claude", "A", -0.5, "r", 0);
        assert_eq!(v.confidence, 0.0);
    }

    #[test]
    fn short_member_name() {
        let v = Vote::new("m1", "claude-sonnet-4.5", "A", 0.9, "r", 0);
        assert_eq!(v.short_member_name(), "claude");
    }
}
