//! Console output formatter for a finished council session.

use crate::output::formatter::OutputFormatter;
use colored::Colorize;
use quorum_domain::council::{CouncilSession, SessionStatus, StagePayload};

/// Formats council sessions for console display.
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format the complete session: every stage plus the synthesis.
    pub fn format(session: &CouncilSession) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("Council Orchestrator Results"));
        output.push('\n');

        output.push_str(&format!("{} {}\n\n", "Question:".cyan().bold(), session.question));
        output.push_str(&format!(
            "{} {}\n\n",
            "Members:".cyan().bold(),
            session.members.iter().map(|m| format!("{} ({})", m.name, m.role)).collect::<Vec<_>>().join(", ")
        ));

        for (idx, stage) in session.stages.iter().enumerate() {
            output.push_str(&Self::section_header(&format!("Stage {}: {}", idx + 1, stage.stage())));
            match &stage.payload {
                StagePayload::Opinions { responses } | StagePayload::Review { responses } => {
                    for r in responses {
                        output.push_str(&format!("\n{}\n{}\n", format!("── {} ──", r.member_name).yellow().bold(), r.content));
                    }
                }
                StagePayload::Voting { votes, result } => {
                    for v in votes {
                        output.push_str(&format!(
                            "\n{}\nPosition: {}\nConfidence: {:.2}\n",
                            format!("── {} ──", v.member_name).yellow().bold(),
                            v.position,
                            v.confidence
                        ));
                    }
                    output.push_str(&format!(
                        "\n{} winner={:?}, confidenceAvg={:.2}, consensus={}\n",
                        "Tally:".cyan().bold(),
                        result.winner,
                        result.confidence_avg,
                        result.consensus_reached
                    ));
                }
                StagePayload::Synthesis { response, .. } => {
                    output.push_str(&format!("\n{}\n\n{}\n", format!("Synthesizer: {}", response.member_name).yellow().bold(), response.content));
                }
            }
        }

        if session.correction_rounds > 0 {
            output.push_str(&format!("\n{} {}\n", "Self-correction rounds:".cyan().bold(), session.correction_rounds));
        }

        output.push_str(&Self::section_header("Outcome"));
        match session.status {
            SessionStatus::Completed => {
                output.push_str(&format!(
                    "\n{} {:.2}\n\n{}\n",
                    "Final confidence:".cyan().bold(),
                    session.final_confidence.unwrap_or_default(),
                    session.final_answer.as_deref().unwrap_or("")
                ));
            }
            SessionStatus::Failed => {
                output.push_str(&format!("\n{} {}\n", "Failed:".red().bold(), session.error.as_deref().unwrap_or("unknown error")));
            }
            _ => output.push_str("\n(session did not reach a terminal state)\n"),
        }

        output.push_str(&Self::footer());
        output
    }

    /// Format as JSON.
    pub fn format_json(session: &CouncilSession) -> String {
        serde_json::to_string_pretty(session).unwrap_or_else(|_| "{}".to_string())
    }

    /// Format synthesis only (concise output).
    pub fn format_synthesis_only(session: &CouncilSession) -> String {
        let mut output = String::new();

        output.push_str(&format!("{}\n\n", "=== Council Conclusion ===".cyan().bold()));
        output.push_str(&format!("{} {}\n\n", "Q:".bold(), session.question));
        output.push_str(&format!(
            "{} {}\n\n",
            "Council:".dimmed(),
            session.members.iter().map(|m| m.name.as_str()).collect::<Vec<_>>().join(", ")
        ));

        match session.status {
            SessionStatus::Completed => {
                output.push_str(session.final_answer.as_deref().unwrap_or(""));
                output.push('\n');
                output.push_str(&format!(
                    "\n{} {:.2}\n",
                    "Confidence:".dimmed(),
                    session.final_confidence.unwrap_or_default()
                ));
            }
            SessionStatus::Failed => {
                output.push_str(&format!("{} {}\n", "Failed:".red().bold(), session.error.as_deref().unwrap_or("unknown error")));
            }
            _ => output.push_str("(session did not reach a terminal state)\n"),
        }

        output
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }

    /// Indent a multi-line string.
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines().map(|line| format!("{}{}", prefix, line)).collect::<Vec<_>>().join("\n")
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format(&self, session: &CouncilSession) -> String {
        Self::format(session)
    }

    fn format_json(&self, session: &CouncilSession) -> String {
        Self::format_json(session)
    }

    fn format_synthesis_only(&self, session: &CouncilSession) -> String {
        Self::format_synthesis_only(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_domain::council::{Complexity, CouncilPlan, IterationStrategy, VotingMethod};

    fn plan() -> CouncilPlan {
        CouncilPlan {
            complexity: Complexity::Simple,
            domain: "general".into(),
            reasoning: "test".into(),
            council_size: 1,
            members: vec![],
            voting_method: VotingMethod::Majority,
            allow_iterations: false,
            max_iterations: 1,
            iteration_strategy: IterationStrategy::Refine,
        }
    }

    #[test]
    fn synthesis_only_reports_failure_reason() {
        let mut session = CouncilSession::new("s1", "Q?", plan(), 0);
        session.fail("no adapters", 1);
        let out = ConsoleFormatter::format_synthesis_only(&session);
        assert!(out.contains("no adapters"));
    }

    #[test]
    fn synthesis_only_reports_final_answer() {
        let mut session = CouncilSession::new("s1", "Q?", plan(), 0);
        session.start_running(1);
        session.complete("42", 0.9, 2);
        let out = ConsoleFormatter::format_synthesis_only(&session);
        assert!(out.contains("42"));
        assert!(out.contains("0.90") || out.contains("0.9"));
    }

    #[test]
    fn json_round_trips_question() {
        let session = CouncilSession::new("s1", "What is entropy?", plan(), 0);
        let json = ConsoleFormatter::format_json(&session);
        assert!(json.contains("What is entropy?"));
    }
}
