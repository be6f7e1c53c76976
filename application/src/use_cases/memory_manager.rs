//! Memory Manager (C4, §4.4).
//!
//! Three tiers: short-term (raw exchanges of this session), working
//! (distilled consensus/disagreements/open-questions/key-insights), and
//! long-term (out of scope for persistence here — §10.6). Compresses via a
//! [`ModelAdapter`] completion call, the same way the council pipeline calls
//! out to a model for synthesis.

use crate::ports::model_adapter::{CompletionOptions, ModelAdapter};
use quorum_domain::council::{StagePayload, StageResult, Vote};
use std::collections::HashMap;

/// Chars-per-token ratio used for the approximate token estimate (§4.4).
const CHARS_PER_TOKEN: usize = 4;

const COMPRESSION_MAX_TOKENS: u32 = 200;

const COMPRESSION_PROMPT_TEMPLATE: &str = "Summarize the following council deliberation memory into a dense, \
factual digest no longer than 200 tokens. Preserve every distinct consensus point, disagreement, and open \
question; drop rhetorical flourish.\n\n{memory}";

/// One distilled record produced by `update_from_stage_result` (§4.4).
#[derive(Debug, Clone, Default)]
pub struct WorkingMemory {
    pub consensus: Vec<String>,
    pub disagreements: Vec<String>,
    pub open_questions: Vec<String>,
    pub key_insights: Vec<String>,
}

pub struct MemoryManager {
    max_context_tokens: u64,
    short_term: Vec<String>,
    working: WorkingMemory,
}

impl MemoryManager {
    pub fn new(max_context_tokens: u64) -> Self {
        Self { max_context_tokens, short_term: Vec::new(), working: WorkingMemory::default() }
    }

    /// Approximate token count for `text` (§4.4: "cost ≈ 4 chars/token acceptable").
    pub fn estimate_tokens(text: &str) -> u64 {
        (text.chars().count() as u64).div_ceil(CHARS_PER_TOKEN as u64)
    }

    /// Distils a completed stage's result into working memory (§4.4).
    ///
    /// For a `Voting` stage: the winning position becomes a consensus entry;
    /// losing positions with confidence below `self_correction_threshold`
    /// become open questions (they're the ones the council was least sure
    /// about). For other stages the raw responses are appended to short-term.
    pub fn update_from_stage_result(&mut self, result: &StageResult, low_confidence_threshold: f64) {
        match &result.payload {
            StagePayload::Voting { votes, result: tally } => {
                if let Some(winner) = &tally.winner {
                    self.working.consensus.push(winner.clone());
                }
                for low in Self::low_confidence_dissents(votes, tally.winner.as_deref(), low_confidence_threshold) {
                    self.working.open_questions.push(low);
                }
            }
            StagePayload::Opinions { responses } | StagePayload::Review { responses } => {
                let stage_label = result.stage().as_str();
                for r in responses {
                    self.short_term.push(format!("[{stage_label}] ({}): {}", r.member_name, r.content));
                }
            }
            StagePayload::Synthesis { response, .. } => {
                self.working.key_insights.push(response.content.clone());
            }
        }
    }

    fn low_confidence_dissents(votes: &[Vote], winner: Option<&str>, threshold: f64) -> Vec<String> {
        votes
            .iter()
            .filter(|v| Some(v.position.as_str()) != winner && v.confidence < threshold)
            .map(|v| format!("{} (confidence {:.2}): {}", v.position, v.confidence, v.reasoning))
            .collect()
    }

    /// `true` when the estimated token cost of short-term plus working memory
    /// exceeds `maxContextTokens` (§4.4).
    pub fn is_over_limit(&self) -> bool {
        Self::estimate_tokens(&self.raw_short_term_text()) + Self::estimate_tokens(&self.get_context_prompt())
            > self.max_context_tokens
    }

    fn raw_short_term_text(&self) -> String {
        self.short_term.join("\n")
    }

    /// Compresses short-term memory via `compressor` (§4.4). On success,
    /// short-term is replaced by the compressor's summary. On failure, keeps
    /// the longest suffix of short-term entries that fits within the limit.
    ///
    /// Returns `(tokens_before, tokens_after)` for the `memory-compressed`
    /// trace event. This call is excluded from the iteration controller's
    /// token budget (§9): the caller must not pass its usage to
    /// `IterationController::record_iteration`.
    pub async fn compress(&mut self, compressor: &dyn ModelAdapter) -> (u64, u64) {
        let before = Self::estimate_tokens(&self.raw_short_term_text());
        let prompt = COMPRESSION_PROMPT_TEMPLATE.replace("{memory}", &self.raw_short_term_text());
        let opts = CompletionOptions::default().with_max_tokens(COMPRESSION_MAX_TOKENS);
        let messages = vec![quorum_domain::council::Message::user(prompt)];

        match compressor.complete(&messages, &opts).await {
            Ok(response) => {
                self.short_term = vec![response.content];
            }
            Err(_) => {
                self.keep_longest_fitting_suffix();
            }
        }

        let after = Self::estimate_tokens(&self.raw_short_term_text());
        (before, after)
    }

    fn keep_longest_fitting_suffix(&mut self) {
        let mut kept = Vec::new();
        let mut tokens = 0u64;
        for entry in self.short_term.iter().rev() {
            let entry_tokens = Self::estimate_tokens(entry);
            if tokens + entry_tokens > self.max_context_tokens {
                break;
            }
            tokens += entry_tokens;
            kept.push(entry.clone());
        }
        kept.reverse();
        self.short_term = kept;
    }

    /// Deterministic markdown serialization of working memory, suitable for
    /// prepending to the next iteration's user message (§4.4).
    pub fn get_context_prompt(&self) -> String {
        if self.working.consensus.is_empty()
            && self.working.disagreements.is_empty()
            && self.working.open_questions.is_empty()
            && self.working.key_insights.is_empty()
        {
            return String::new();
        }

        let mut out = String::from("## Prior deliberation context\n\n");
        Self::append_section(&mut out, "Consensus so far", &self.working.consensus);
        Self::append_section(&mut out, "Disagreements", &self.working.disagreements);
        Self::append_section(&mut out, "Open questions", &self.working.open_questions);
        Self::append_section(&mut out, "Key insights", &self.working.key_insights);
        out
    }

    fn append_section(out: &mut String, title: &str, items: &[String]) {
        if items.is_empty() {
            return;
        }
        out.push_str(&format!("### {title}\n"));
        for item in items {
            out.push_str(&format!("- {item}\n"));
        }
        out.push('\n');
    }

    pub fn working_memory(&self) -> &WorkingMemory {
        &self.working
    }
}

/// Groundwork for the optional long-term tier (§4.4): keyed by session id,
/// not wired to any pipeline path in this implementation since persistence
/// beyond working memory is explicitly out of scope.
#[allow(dead_code)]
pub struct LongTermMemoryStub {
    pub entries: HashMap<String, Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_domain::council::{MemberResponse, TokenUsage, VotingMethod, VotingResult};
    use std::collections::HashMap as Map;

    fn voting_stage(votes: Vec<Vote>, winner: Option<&str>) -> StageResult {
        let result = VotingResult {
            method: VotingMethod::Majority,
            winner: winner.map(str::to_string),
            votes: votes.clone(),
            breakdown: Map::new(),
            confidence_avg: 0.8,
            consensus_reached: winner.is_some(),
            rounds_needed: 1,
            metadata: Map::new(),
        };
        StageResult::new(StagePayload::Voting { votes, result }, 0, 10)
    }

    #[test]
    fn estimate_tokens_uses_four_chars_per_token() {
        assert_eq!(MemoryManager::estimate_tokens("12345678"), 2);
        assert_eq!(MemoryManager::estimate_tokens("123"), 1);
        assert_eq!(MemoryManager::estimate_tokens(""), 0);
    }

    #[test]
    fn voting_stage_distils_winner_and_dissent() {
        let mut mgr = MemoryManager::new(1000);
        let votes = vec![
            Vote::new("m1", "m1", "A", 0.9, "strong reasoning", 0),
            Vote::new("m2", "m2", "B", 0.3, "weak counterpoint", 0),
        ];
        let stage = voting_stage(votes, Some("A"));
        mgr.update_from_stage_result(&stage, 0.6);

        assert_eq!(mgr.working_memory().consensus, vec!["A".to_string()]);
        assert_eq!(mgr.working_memory().open_questions.len(), 1);
        assert!(mgr.working_memory().open_questions[0].contains('B'));
    }

    #[test]
    fn get_context_prompt_is_empty_until_something_is_recorded() {
        let mgr = MemoryManager::new(1000);
        assert_eq!(mgr.get_context_prompt(), "");
    }

    #[test]
    fn get_context_prompt_renders_sections_deterministically() {
        let mut mgr = MemoryManager::new(1000);
        let stage = voting_stage(vec![Vote::new("m1", "m1", "A", 0.9, "r", 0)], Some("A"));
        mgr.update_from_stage_result(&stage, 0.6);
        let prompt = mgr.get_context_prompt();
        assert!(prompt.starts_with("## Prior deliberation context"));
        assert!(prompt.contains("### Consensus so far"));
        assert!(prompt.contains("- A"));
    }

    #[test]
    fn opinions_stage_appends_to_short_term() {
        let mut mgr = MemoryManager::new(1000);
        let response = MemberResponse {
            member_id: "m1".into(),
            member_name: "Claude".into(),
            model_id: "claude-sonnet-4.5".into(),
            content: "My position is X.".into(),
            token_usage: TokenUsage::new(10, 5),
            latency_ms: 100,
            timestamp: 0,
        };
        let stage = StageResult::new(StagePayload::Opinions { responses: vec![response] }, 0, 10);
        mgr.update_from_stage_result(&stage, 0.6);
        assert_eq!(mgr.short_term.len(), 1);
        assert!(mgr.short_term[0].contains("Claude"));
    }

    #[test]
    fn is_over_limit_detects_large_short_term_memory() {
        let mut mgr = MemoryManager::new(5);
        let response = MemberResponse {
            member_id: "m1".into(),
            member_name: "Claude".into(),
            model_id: "m".into(),
            content: "x".repeat(200),
            token_usage: TokenUsage::new(1, 1),
            latency_ms: 1,
            timestamp: 0,
        };
        let stage = StageResult::new(StagePayload::Opinions { responses: vec![response] }, 0, 1);
        mgr.update_from_stage_result(&stage, 0.6);
        assert!(mgr.is_over_limit());
    }

    struct FailingCompressor;

    #[async_trait::async_trait]
    impl ModelAdapter for FailingCompressor {
        fn model(&self) -> &quorum_domain::council::ModelConfig {
            use std::sync::OnceLock;
            static CFG: OnceLock<quorum_domain::council::ModelConfig> = OnceLock::new();
            CFG.get_or_init(|| {
                quorum_domain::council::ModelConfig::new(
                    "compressor",
                    quorum_domain::council::ProviderKind::AZURE_CHAT,
                    "compressor",
                )
            })
        }

        async fn complete(
            &self,
            _messages: &[quorum_domain::council::Message],
            _opts: &CompletionOptions,
        ) -> Result<crate::ports::model_adapter::CompletionResponse, crate::ports::model_adapter::AdapterError>
        {
            Err(crate::ports::model_adapter::AdapterError::Upstream("down".into()))
        }

        async fn health_check(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn compress_falls_back_to_longest_fitting_suffix_on_failure() {
        let mut mgr = MemoryManager::new(3);
        mgr.short_term = vec!["aaaa".to_string(), "bb".to_string()];
        let compressor = FailingCompressor;
        let (_before, after) = mgr.compress(&compressor).await;
        // "bb" is 1 token, fits in budget of 3; "aaaa" (1 token) + "bb" (1 token) = 2 <= 3, both kept
        assert!(after <= 3);
        assert!(!mgr.short_term.is_empty());
    }
}
