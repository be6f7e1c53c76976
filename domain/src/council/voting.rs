//! Voting tally (C2): a pure, deterministic function from a set of [`Vote`]s
//! to a [`VotingResult`].
//!
//! Covers the full method table of §4.2 — majority, super-majority,
//! unanimous, weighted, confidence, ranked-choice, and veto — with a
//! richer position/confidence/breakdown shape than a plain approve/reject
//! tally, since the council's votes carry more than a boolean.

use super::member::Member;
use super::vote::Vote;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Pluggable tally method (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum VotingMethod {
    Majority,
    /// `tau` is the required approval fraction, default `2/3`.
    SuperMajority { tau: f64 },
    /// Alias of `SuperMajority { tau: 1.0 }`.
    Unanimous,
    Weighted,
    Confidence,
    RankedChoice,
    Veto,
}

impl Default for VotingMethod {
    fn default() -> Self {
        VotingMethod::Majority
    }
}

impl VotingMethod {
    pub fn super_majority_default() -> Self {
        VotingMethod::SuperMajority { tau: 2.0 / 3.0 }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VotingMethod::Majority => "majority",
            VotingMethod::SuperMajority { .. } => "super-majority",
            VotingMethod::Unanimous => "unanimous",
            VotingMethod::Weighted => "weighted",
            VotingMethod::Confidence => "confidence",
            VotingMethod::RankedChoice => "ranked-choice",
            VotingMethod::Veto => "veto",
        }
    }
}

impl std::fmt::Display for VotingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for VotingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "majority" => Ok(VotingMethod::Majority),
            "super-majority" | "super_majority" => Ok(VotingMethod::super_majority_default()),
            "unanimous" => Ok(VotingMethod::Unanimous),
            "weighted" => Ok(VotingMethod::Weighted),
            "confidence" => Ok(VotingMethod::Confidence),
            "ranked-choice" | "ranked_choice" | "irv" => Ok(VotingMethod::RankedChoice),
            "veto" => Ok(VotingMethod::Veto),
            _ => Err(format!("unknown voting method: {s}")),
        }
    }
}

/// Result of tallying a set of votes (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VotingResult {
    pub method: VotingMethod,
    pub winner: Option<String>,
    pub votes: Vec<Vote>,
    pub breakdown: HashMap<String, f64>,
    pub confidence_avg: f64,
    pub consensus_reached: bool,
    pub rounds_needed: usize,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Tally `votes` using `method`. `members` supplies voting weights for the
/// `weighted` method, looked up by `member_id`.
///
/// Pure and deterministic: two calls with the same (sorted) input produce
/// byte-equal results (§8 idempotence).
pub fn tally(votes: &[Vote], method: VotingMethod, members: &[Member]) -> VotingResult {
    let mut votes = votes.to_vec();
    votes.sort_by(|a, b| a.member_id.cmp(&b.member_id));

    let confidence_avg = mean_confidence(&votes);

    if votes.is_empty() {
        return VotingResult {
            method,
            winner: None,
            votes,
            breakdown: HashMap::new(),
            confidence_avg: 0.0,
            consensus_reached: false,
            rounds_needed: 0,
            metadata: HashMap::new(),
        };
    }

    match method {
        VotingMethod::Majority => tally_count_based(votes, method, confidence_avg, |count, n| count * 2 > n),
        VotingMethod::SuperMajority { tau } => {
            tally_count_based(votes, method, confidence_avg, move |count, n| {
                count >= required_count(n, tau)
            })
        }
        VotingMethod::Unanimous => {
            tally_count_based(votes, method, confidence_avg, |count, n| count == n)
        }
        VotingMethod::Weighted => tally_score_based(votes, method, confidence_avg, members, true),
        VotingMethod::Confidence => tally_score_based(votes, method, confidence_avg, members, false),
        VotingMethod::RankedChoice => tally_ranked_choice(votes, confidence_avg),
        VotingMethod::Veto => tally_veto(votes, confidence_avg),
    }
}

fn mean_confidence(votes: &[Vote]) -> f64 {
    if votes.is_empty() {
        return 0.0;
    }
    votes.iter().map(|v| v.confidence).sum::<f64>() / votes.len() as f64
}

fn required_count(n: usize, tau: f64) -> usize {
    (n as f64 * tau).ceil() as usize
}

fn avg_confidence_by_position(votes: &[Vote]) -> HashMap<String, f64> {
    let mut sums: HashMap<String, (f64, usize)> = HashMap::new();
    for v in votes {
        let entry = sums.entry(v.position.clone()).or_insert((0.0, 0));
        entry.0 += v.confidence;
        entry.1 += 1;
    }
    sums.into_iter().map(|(k, (sum, n))| (k, sum / n as f64)).collect()
}

/// Pick the winning position from a score breakdown: highest score, ties
/// broken by higher average confidence, then lexicographically smaller
/// position string (§4.2).
fn pick_winner(breakdown: &HashMap<String, f64>, avg_conf: &HashMap<String, f64>) -> Option<String> {
    let mut positions: Vec<&String> = breakdown.keys().collect();
    if positions.is_empty() {
        return None;
    }
    positions.sort_by(|a, b| {
        let sa = breakdown[*a];
        let sb = breakdown[*b];
        sb.total_cmp(&sa)
            .then_with(|| {
                let ca = avg_conf.get(*a).copied().unwrap_or(0.0);
                let cb = avg_conf.get(*b).copied().unwrap_or(0.0);
                cb.total_cmp(&ca)
            })
            .then_with(|| a.cmp(b))
    });
    positions.first().map(|s| (*s).clone())
}

fn tally_count_based(
    votes: Vec<Vote>,
    method: VotingMethod,
    confidence_avg: f64,
    win_condition: impl Fn(usize, usize) -> bool,
) -> VotingResult {
    let n = votes.len();
    let mut counts: HashMap<String, usize> = HashMap::new();
    for v in &votes {
        *counts.entry(v.position.clone()).or_insert(0) += 1;
    }
    let breakdown: HashMap<String, f64> = counts.iter().map(|(k, v)| (k.clone(), *v as f64)).collect();
    let avg_conf = avg_confidence_by_position(&votes);
    let candidate = pick_winner(&breakdown, &avg_conf);

    let (winner, consensus_reached) = match candidate {
        Some(pos) if win_condition(counts[&pos], n) => (Some(pos), true),
        _ => (None, false),
    };

    VotingResult {
        method,
        winner,
        votes,
        breakdown,
        confidence_avg,
        consensus_reached,
        rounds_needed: 1,
        metadata: HashMap::new(),
    }
}

fn tally_score_based(
    votes: Vec<Vote>,
    method: VotingMethod,
    confidence_avg: f64,
    members: &[Member],
    weighted: bool,
) -> VotingResult {
    let weight_of = |member_id: &str| -> f64 {
        members.iter().find(|m| m.id == member_id).map(|m| m.weight).unwrap_or(1.0)
    };

    let mut scores: HashMap<String, f64> = HashMap::new();
    for v in &votes {
        let w = if weighted { weight_of(&v.member_id) } else { 1.0 };
        *scores.entry(v.position.clone()).or_insert(0.0) += w * v.confidence;
    }
    let avg_conf = avg_confidence_by_position(&votes);
    let candidate = pick_winner(&scores, &avg_conf);

    let (winner, consensus_reached) = match candidate {
        Some(pos) if scores[&pos] > 0.0 => (Some(pos), true),
        _ => (None, false),
    };

    VotingResult {
        method,
        winner,
        votes,
        breakdown: scores,
        confidence_avg,
        consensus_reached,
        rounds_needed: 1,
        metadata: HashMap::new(),
    }
}

fn tally_veto(votes: Vec<Vote>, confidence_avg: f64) -> VotingResult {
    let vetoers: Vec<&Vote> = votes.iter().filter(|v| v.veto).collect();
    let mut result = tally_count_based(votes.clone(), VotingMethod::Veto, confidence_avg, |count, n| count * 2 > n);

    if !vetoers.is_empty() {
        result.winner = None;
        result.consensus_reached = false;
        let vetoer_ids: Vec<serde_json::Value> = vetoers
            .iter()
            .map(|v| {
                serde_json::json!({
                    "memberId": v.member_id,
                    "memberName": v.member_name,
                    "reasoning": v.reasoning,
                })
            })
            .collect();
        result.metadata.insert("vetoers".to_string(), serde_json::Value::Array(vetoer_ids));
    }

    result
}

const MAX_IRV_ROUNDS: usize = 100;

fn tally_ranked_choice(votes: Vec<Vote>, confidence_avg: f64) -> VotingResult {
    // Breakdown always reflects first-choice counts across the positions observed,
    // even in the degenerate no-rank case.
    let mut first_choice_breakdown: HashMap<String, f64> = HashMap::new();
    for v in &votes {
        *first_choice_breakdown.entry(v.position.clone()).or_insert(0.0) += 1.0;
    }

    let mut ballots: Vec<Vec<String>> =
        votes.iter().filter_map(|v| v.rank.clone()).filter(|r| !r.is_empty()).collect();

    if ballots.is_empty() {
        return VotingResult {
            method: VotingMethod::RankedChoice,
            winner: None,
            votes,
            breakdown: first_choice_breakdown,
            confidence_avg,
            consensus_reached: false,
            rounds_needed: 0,
            metadata: HashMap::new(),
        };
    }

    let mut rounds_needed = 0;
    let winner = loop {
        rounds_needed += 1;
        if rounds_needed > MAX_IRV_ROUNDS {
            break None;
        }

        let mut counts: HashMap<String, usize> = HashMap::new();
        for ballot in &ballots {
            if let Some(choice) = ballot.first() {
                *counts.entry(choice.clone()).or_insert(0) += 1;
            }
        }

        if counts.is_empty() {
            break None;
        }

        let total_remaining: usize = counts.values().sum();
        let mut ranked: Vec<(&String, &usize)> = counts.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        let (leader, &leader_count) = ranked[0];
        if leader_count * 2 > total_remaining {
            break Some(leader.clone());
        }
        if counts.len() <= 1 {
            break counts.into_keys().next();
        }

        // Eliminate the minimum; tie-break lexicographically smallest first.
        let mut worst: Vec<(&String, &usize)> = counts.iter().collect();
        worst.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));
        let eliminated = worst[0].0.clone();

        for ballot in &mut ballots {
            ballot.retain(|c| *c != eliminated);
        }
        ballots.retain(|b| !b.is_empty());
        if ballots.is_empty() {
            break None;
        }
    };

    VotingResult {
        method: VotingMethod::RankedChoice,
        consensus_reached: winner.is_some(),
        winner,
        votes,
        breakdown: first_choice_breakdown,
        confidence_avg,
        rounds_needed,
        metadata: HashMap::new(),
    }
}
