//! Output formatter trait.

use quorum_domain::council::CouncilSession;

/// Formats a finished council session for display.
pub trait OutputFormatter {
    /// Every stage: opinions, reviews, votes, and the synthesis.
    fn format(&self, session: &CouncilSession) -> String;

    /// The session, serialized as JSON.
    fn format_json(&self, session: &CouncilSession) -> String;

    /// Only the final synthesized answer.
    fn format_synthesis_only(&self, session: &CouncilSession) -> String;
}
