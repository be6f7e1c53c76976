//! Council member roles and the canonical system-prompt registry.
//!
//! Role-specific behavior is a table (role → prompt), not a subclass hierarchy,
//! matching the "interfaces over inheritance" design note: roles form a tagged
//! union and the pipeline looks up behavior by matching on the tag.

use serde::{Deserialize, Serialize};

/// Behavioral archetype a [`Member`](super::member::Member) plays in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    OpinionGiver,
    Reviewer,
    Synthesizer,
    Backup,
    Arbiter,
    DevilAdvocate,
    FactChecker,
    DomainExpert,
    Moderator,
    Skeptic,
    Creative,
    Critic,
}

impl Role {
    /// All roles, in the order they first appear in §3's role table.
    pub const ALL: [Role; 12] = [
        Role::OpinionGiver,
        Role::Reviewer,
        Role::Synthesizer,
        Role::Backup,
        Role::Arbiter,
        Role::DevilAdvocate,
        Role::FactChecker,
        Role::DomainExpert,
        Role::Moderator,
        Role::Skeptic,
        Role::Creative,
        Role::Critic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::OpinionGiver => "opinion-giver",
            Role::Reviewer => "reviewer",
            Role::Synthesizer => "synthesizer",
            Role::Backup => "backup",
            Role::Arbiter => "arbiter",
            Role::DevilAdvocate => "devil-advocate",
            Role::FactChecker => "fact-checker",
            Role::DomainExpert => "domain-expert",
            Role::Moderator => "moderator",
            Role::Skeptic => "skeptic",
            Role::Creative => "creative",
            Role::Critic => "critic",
        }
    }

    /// Roles that contribute free-form positions in the Opinions stage (§4.6.c).
    pub fn is_opinion_giving(&self) -> bool {
        matches!(
            self,
            Role::OpinionGiver | Role::DevilAdvocate | Role::Creative | Role::DomainExpert | Role::Skeptic
        )
    }

    /// Roles that critique opinions in the Review stage (§4.6.d).
    pub fn is_reviewing(&self) -> bool {
        matches!(self, Role::Reviewer | Role::FactChecker | Role::Critic)
    }

    /// Roles excluded from casting a vote in the Voting stage (§4.6.e).
    pub fn is_voting_excluded(&self) -> bool {
        matches!(self, Role::Synthesizer | Role::Moderator)
    }

    /// The canonical system prompt for this role (§6.4 registry).
    ///
    /// This registry is closed: every [`Role`] variant has exactly one entry.
    pub fn canonical_system_prompt(&self) -> &'static str {
        match self {
            Role::OpinionGiver => {
                "You are a council member giving your independent opinion on a question.\n\
                 State a clear position and support it with explicit reasoning. Consider the \
                 strongest counter-arguments before committing to your stance. End your response \
                 with a line of the exact form `Confidence: x` where x is a number between 0 and 1 \
                 reflecting how confident you are in your position."
            }
            Role::Reviewer => {
                "You are a reviewer evaluating opinions from other council members.\n\
                 Evaluate each labeled opinion in turn for its strengths and weaknesses. Rate each \
                 opinion on a scale of 1-10 and justify the rating. Be specific about what would \
                 make a weak opinion stronger."
            }
            Role::Synthesizer => {
                "You are the synthesizer producing the council's final answer.\n\
                 Integrate the strongest points from the debate into one coherent answer. \
                 Explicitly acknowledge minority or dissenting views where they have merit, and \
                 state your overall confidence in the synthesized answer."
            }
            Role::Backup => {
                "You are a backup council member activated because the council could not reach \
                 sufficient consensus confidence.\n\
                 Bring a fresh, independent perspective. Address the gaps and weaknesses that left \
                 the existing council divided rather than repeating positions already on the table."
            }
            Role::Arbiter => {
                "You are an arbiter resolving a tie or near-tie between competing positions.\n\
                 Weigh the competing positions directly against each other and state, with explicit \
                 reasoning, which one should prevail and why."
            }
            Role::DevilAdvocate => {
                "You are the devil's advocate for this council.\n\
                 Identify the emerging consensus and oppose it with the strongest counter-arguments \
                 you can construct, even if you do not personally believe them. Your job is to \
                 pressure-test the consensus, not to be agreeable."
            }
            Role::FactChecker => {
                "You are a fact-checker reviewing claims made by other council members.\n\
                 For each factual claim you find, classify it as exactly one of: VERIFIED, \
                 QUESTIONABLE, INCORRECT, OPINION, or NEEDS VERIFICATION, and briefly justify the \
                 classification."
            }
            Role::DomainExpert => {
                "You are a domain expert participating in this council.\n\
                 Provide specialist depth beyond what a generalist would offer, and explicitly \
                 correct any misconceptions a non-expert might hold about this topic."
            }
            Role::Moderator => {
                "You are the neutral moderator facilitating this council's discussion.\n\
                 Do not take a side. Summarize where the council agrees, where it disagrees, and \
                 what open questions remain unresolved."
            }
            Role::Skeptic => {
                "You are the resident skeptic on this council.\n\
                 Surface hidden assumptions behind the other members' claims, demand concrete \
                 evidence where it is missing, and flag any position that sounds more confident \
                 than its support warrants."
            }
            Role::Creative => {
                "You are the creative member of this council.\n\
                 Produce unconventional alternatives that the rest of the council is unlikely to \
                 propose on its own. Favor originality over safety, while still answering the \
                 question asked."
            }
            Role::Critic => {
                "You are a critic providing constructive feedback on the council's work so far.\n\
                 Identify concrete weaknesses and, for each one, propose a specific improvement \
                 rather than a general complaint."
            }
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "opinion-giver" | "opinion_giver" => Ok(Role::OpinionGiver),
            "reviewer" => Ok(Role::Reviewer),
            "synthesizer" => Ok(Role::Synthesizer),
            "backup" => Ok(Role::Backup),
            "arbiter" => Ok(Role::Arbiter),
            "devil-advocate" | "devil_advocate" => Ok(Role::DevilAdvocate),
            "fact-checker" | "fact_checker" => Ok(Role::FactChecker),
            "domain-expert" | "domain_expert" => Ok(Role::DomainExpert),
            "moderator" => Ok(Role::Moderator),
            "skeptic" => Ok(Role::Skeptic),
            "creative" => Ok(Role::Creative),
            "critic" => Ok(Role::Critic),
            _ => Err(format!("unknown role: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_role_has_a_nonempty_prompt() {
        for role in Role::ALL {
            assert!(!role.canonical_system_prompt().is_empty(), "{role} has no prompt");
        }
    }

    #[test]
    fn opinion_giving_roles() {
        assert!(Role::OpinionGiver.is_opinion_giving());
        assert!(Role::DevilAdvocate.is_opinion_giving());
        assert!(Role::Creative.is_opinion_giving());
        assert!(Role::DomainExpert.is_opinion_giving());
        assert!(Role::Skeptic.is_opinion_giving());
        assert!(!Role::Reviewer.is_opinion_giving());
    }

    #[test]
    fn reviewing_roles() {
        assert!(Role::Reviewer.is_reviewing());
        assert!(Role::FactChecker.is_reviewing());
        assert!(Role::Critic.is_reviewing());
        assert!(!Role::OpinionGiver.is_reviewing());
    }

    #[test]
    fn voting_excluded_roles() {
        assert!(Role::Synthesizer.is_voting_excluded());
        assert!(Role::Moderator.is_voting_excluded());
        assert!(!Role::Reviewer.is_voting_excluded());
    }

    #[test]
    fn round_trip_str() {
        for role in Role::ALL {
            let s = role.as_str();
            let parsed: Role = s.parse().unwrap();
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn fact_checker_prompt_mentions_classification_labels() {
        let prompt = Role::FactChecker.canonical_system_prompt();
        for label in ["VERIFIED", "QUESTIONABLE", "INCORRECT", "OPINION", "NEEDS VERIFICATION"] {
            assert!(prompt.contains(label), "missing {label}");
        }
    }
}
